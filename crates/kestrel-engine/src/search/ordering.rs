//! Staged move picker.
//!
//! Moves come out in stages so that a cutoff early in the list skips the
//! scoring work for everything after it:
//!
//! 1. hash move (validated for legality)
//! 2. good captures and queen promotions, by victim value then exchange value
//! 3. killer moves
//! 4. counter move
//! 5. remaining quiets by history score
//! 6. losing captures and underpromotions
//!
//! Quiescence uses a shorter sequence: good captures only, or every evasion
//! when in check.

use kestrel_core::{Color, MAX_MOVES, Move, MoveList, Piece, Position, piece_value};

use crate::search::heuristics::HistoryTable;

/// Places a capture's victim value above any exchange value.
const VICTIM_SCALE: i32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    TtMove,
    GenerateCaptures,
    GoodCaptures,
    Killers,
    CounterMove,
    GenerateQuiets,
    Quiets,
    BadCaptures,
    QsGenerate,
    QsMoves,
    Done,
}

/// Produces one move at a time in staged order.
pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    killer_index: usize,
    counter: Move,
    side: Color,
    skip_quiets: bool,
    prefer_later: bool,
    qs_in_check: bool,
    qs_checks: bool,
    buffer: [Move; MAX_MOVES],
    scores: [i32; MAX_MOVES],
    cursor: usize,
    end: usize,
    quiets: MoveList,
    bad_captures: MoveList,
    bad_cursor: usize,
}

impl MovePicker {
    fn blank(side: Color) -> Self {
        Self {
            stage: Stage::Done,
            tt_move: Move::NULL,
            killers: [Move::NULL; 2],
            killer_index: 0,
            counter: Move::NULL,
            side,
            skip_quiets: false,
            prefer_later: false,
            qs_in_check: false,
            qs_checks: false,
            buffer: [Move::NULL; MAX_MOVES],
            scores: [0; MAX_MOVES],
            cursor: 0,
            end: 0,
            quiets: MoveList::new(),
            bad_captures: MoveList::new(),
            bad_cursor: 0,
        }
    }

    /// Picker for a main-search node.
    ///
    /// `prefer_later` flips how equal scores are broken, which helper
    /// threads use to walk the tree in a different order.
    pub fn new(pos: &Position, tt_move: Move, killers: [Move; 2], counter: Move, prefer_later: bool) -> Self {
        let mut picker = Self::blank(pos.side_to_move());
        picker.stage = Stage::TtMove;
        picker.tt_move = if pos.is_legal(tt_move) { tt_move } else { Move::NULL };
        picker.killers = killers;
        picker.counter = counter;
        picker.prefer_later = prefer_later;
        picker
    }

    /// Picker for a quiescence node. In check every evasion is produced;
    /// otherwise non-losing captures, plus quiet checks if `with_checks`.
    pub fn new_qsearch(pos: &Position, in_check: bool, with_checks: bool) -> Self {
        let mut picker = Self::blank(pos.side_to_move());
        picker.stage = Stage::QsGenerate;
        picker.qs_in_check = in_check;
        picker.qs_checks = with_checks && !in_check;
        picker
    }

    /// Stop producing quiet moves (late move pruning).
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    fn capture_score(pos: &Position, mv: Move, see: i32) -> i32 {
        let victim = pos.captured_piece(mv).map_or(0, piece_value);
        let promo = mv.promotion().map_or(0, piece_value);
        (victim + promo) * VICTIM_SCALE + see.clamp(0, VICTIM_SCALE - 1)
    }

    fn push(&mut self, mv: Move, score: i32) {
        if self.end < MAX_MOVES {
            self.buffer[self.end] = mv;
            self.scores[self.end] = score;
            self.end += 1;
        }
    }

    /// Swap the best remaining buffered move to the cursor and return it.
    fn pick_best(&mut self) -> Option<Move> {
        if self.cursor >= self.end {
            return None;
        }
        let mut best = self.cursor;
        for i in self.cursor + 1..self.end {
            let better = if self.prefer_later {
                self.scores[i] >= self.scores[best]
            } else {
                self.scores[i] > self.scores[best]
            };
            if better {
                best = i;
            }
        }
        self.buffer.swap(self.cursor, best);
        self.scores.swap(self.cursor, best);
        let mv = self.buffer[self.cursor];
        self.cursor += 1;
        Some(mv)
    }

    fn generate_captures(&mut self, pos: &Position) {
        self.cursor = 0;
        self.end = 0;
        for &mv in pos.legal_moves().iter() {
            if mv == self.tt_move {
                continue;
            }
            if pos.is_quiet(mv) {
                self.quiets.push(mv);
                continue;
            }
            let underpromotion = matches!(mv.promotion(), Some(p) if p != Piece::Queen);
            let see = pos.see(mv);
            if underpromotion || see < 0 {
                self.bad_captures.push(mv);
            } else {
                let score = Self::capture_score(pos, mv, see);
                self.push(mv, score);
            }
        }
    }

    fn is_special_quiet(&self, mv: Move) -> bool {
        mv == self.tt_move || self.killers.contains(&mv) || mv == self.counter
    }

    fn generate_quiets(&mut self, history: &HistoryTable) {
        self.cursor = 0;
        self.end = 0;
        let quiets = std::mem::take(&mut self.quiets);
        for &mv in quiets.iter() {
            if !self.is_special_quiet(mv) {
                self.push(mv, history.score(self.side, mv));
            }
        }
        self.quiets = quiets;
    }

    fn generate_qsearch(&mut self, pos: &Position, history: &HistoryTable) {
        self.cursor = 0;
        self.end = 0;
        if self.qs_in_check {
            for &mv in pos.legal_moves().iter() {
                let score = if pos.is_quiet(mv) {
                    history.score(self.side, mv) - 2 * VICTIM_SCALE
                } else {
                    Self::capture_score(pos, mv, pos.see(mv))
                };
                self.push(mv, score);
            }
            return;
        }
        for &mv in pos.captures().iter() {
            let see = pos.see(mv);
            if see >= 0 {
                let score = Self::capture_score(pos, mv, see);
                self.push(mv, score);
            }
        }
        if self.qs_checks {
            for &mv in pos.legal_moves().iter() {
                if pos.is_quiet(mv) && pos.gives_check(mv) {
                    self.push(mv, -VICTIM_SCALE);
                }
            }
        }
    }

    /// The next move to search, or `None` when the node is exhausted.
    pub fn next_move(&mut self, pos: &Position, history: &HistoryTable) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = Stage::GenerateCaptures;
                    if !self.tt_move.is_null() {
                        return Some(self.tt_move);
                    }
                }
                Stage::GenerateCaptures => {
                    self.generate_captures(pos);
                    self.stage = Stage::GoodCaptures;
                }
                Stage::GoodCaptures => match self.pick_best() {
                    Some(mv) => return Some(mv),
                    None => self.stage = Stage::Killers,
                },
                Stage::Killers => {
                    if self.skip_quiets || self.killer_index >= self.killers.len() {
                        self.stage = Stage::CounterMove;
                        continue;
                    }
                    let killer = self.killers[self.killer_index];
                    let repeated = self.killer_index == 1 && killer == self.killers[0];
                    self.killer_index += 1;
                    if !killer.is_null()
                        && !repeated
                        && killer != self.tt_move
                        && self.quiets.contains(killer)
                    {
                        return Some(killer);
                    }
                }
                Stage::CounterMove => {
                    self.stage = Stage::GenerateQuiets;
                    let counter = self.counter;
                    let fresh = !counter.is_null()
                        && counter != self.tt_move
                        && !self.killers.contains(&counter);
                    if !self.skip_quiets && fresh && self.quiets.contains(counter) {
                        return Some(counter);
                    }
                }
                Stage::GenerateQuiets => {
                    if self.skip_quiets {
                        self.stage = Stage::BadCaptures;
                    } else {
                        self.generate_quiets(history);
                        self.stage = Stage::Quiets;
                    }
                }
                Stage::Quiets => {
                    if !self.skip_quiets
                        && let Some(mv) = self.pick_best()
                    {
                        return Some(mv);
                    }
                    self.stage = Stage::BadCaptures;
                }
                Stage::BadCaptures => {
                    if self.bad_cursor < self.bad_captures.len() {
                        let mv = self.bad_captures[self.bad_cursor];
                        self.bad_cursor += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::QsGenerate => {
                    self.generate_qsearch(pos, history);
                    self.stage = Stage::QsMoves;
                }
                Stage::QsMoves => match self.pick_best() {
                    Some(mv) => return Some(mv),
                    None => self.stage = Stage::Done,
                },
                Stage::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::Square;

    use super::*;

    fn drain(picker: &mut MovePicker, pos: &Position, history: &HistoryTable) -> Vec<Move> {
        std::iter::from_fn(|| picker.next_move(pos, history)).collect()
    }

    const TWO_CAPTURES: &str = "4k3/p7/1p6/3r4/8/8/1Q6/3RK3 w - - 0 1";

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    #[test]
    fn every_legal_move_exactly_once() {
        let p = pos("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let history = HistoryTable::new();
        let tt = p.parse_uci_move("e2a6").unwrap();
        let killer = p.parse_uci_move("a2a3").unwrap();
        let counter = p.parse_uci_move("g2g3").unwrap();
        let mut picker = MovePicker::new(&p, tt, [killer, Move::NULL], counter, false);
        let mut produced = drain(&mut picker, &p, &history);
        assert_eq!(produced[0], tt);

        let mut legal: Vec<Move> = p.legal_moves().iter().copied().collect();
        produced.sort_by_key(|m| m.raw());
        legal.sort_by_key(|m| m.raw());
        assert_eq!(produced, legal);
    }

    #[test]
    fn illegal_hash_move_is_ignored() {
        let p = Position::startpos();
        let bogus = Move::new(Square::E2, Square::E5);
        let mut picker = MovePicker::new(&p, bogus, [Move::NULL; 2], Move::NULL, false);
        let produced = drain(&mut picker, &p, &HistoryTable::new());
        assert_eq!(produced.len(), 20);
        assert!(!produced.contains(&bogus));
    }

    #[test]
    fn stage_order() {
        // Rxd5 wins a rook; Qxb6 drops the queen to axb6.
        let p = pos(TWO_CAPTURES);
        let winning = p.parse_uci_move("d1d5").unwrap();
        let losing = p.parse_uci_move("b2b6").unwrap();
        let killer = p.parse_uci_move("e1f2").unwrap();
        let mut picker = MovePicker::new(&p, Move::NULL, [killer, Move::NULL], Move::NULL, false);
        let produced = drain(&mut picker, &p, &HistoryTable::new());
        assert_eq!(produced[0], winning);
        assert_eq!(produced[1], killer);
        assert_eq!(*produced.last().unwrap(), losing);
    }

    #[test]
    fn quiets_follow_history() {
        let p = Position::startpos();
        let mut history = HistoryTable::new();
        let favourite = p.parse_uci_move("b1c3").unwrap();
        history.update(Color::White, favourite, 500);
        let mut picker = MovePicker::new(&p, Move::NULL, [Move::NULL; 2], Move::NULL, false);
        assert_eq!(picker.next_move(&p, &history), Some(favourite));
    }

    #[test]
    fn skipping_quiets_leaves_only_captures() {
        let p = pos(TWO_CAPTURES);
        let history = HistoryTable::new();
        let mut picker = MovePicker::new(&p, Move::NULL, [Move::NULL; 2], Move::NULL, false);
        let first = picker.next_move(&p, &history).unwrap();
        picker.skip_quiets();
        let rest = drain(&mut picker, &p, &history);
        assert!(p.is_capture(first));
        assert!(rest.iter().all(|&m| p.is_capture(m)));
    }

    #[test]
    fn qsearch_drops_losing_captures() {
        let p = pos(TWO_CAPTURES);
        let mut picker = MovePicker::new_qsearch(&p, false, false);
        let produced = drain(&mut picker, &p, &HistoryTable::new());
        assert_eq!(produced, vec![p.parse_uci_move("d1d5").unwrap()]);
    }

    #[test]
    fn qsearch_in_check_yields_all_evasions() {
        let p = pos("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1");
        let mut picker = MovePicker::new_qsearch(&p, true, false);
        let produced = drain(&mut picker, &p, &HistoryTable::new());
        assert_eq!(produced.len(), p.legal_moves().len());
        assert_eq!(produced[0], p.parse_uci_move("e1e2").unwrap());
    }
}
