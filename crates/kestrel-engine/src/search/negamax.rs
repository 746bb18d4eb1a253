//! Principal variation search.
//!
//! Fail-soft negamax: every node returns the best score it found even when
//! that lies outside the window. Around the plain algorithm sit the hash
//! table, pruning before the move loop (reverse futility, razoring, null
//! move), pruning inside it (late move, futility, SEE), late move
//! reductions and check, pawn-push and singular extensions.

use std::time::Instant;

use kestrel_core::{Color, Move, MoveList, Piece, Position};

use crate::search::SearchStats;
use crate::search::control::SearchControl;
use crate::search::heuristics::{CounterMoveTable, HistoryTable};
use crate::search::ordering::MovePicker;
use crate::search::params::{LmrTable, SearchParams};
use crate::search::score::{DRAW, INF, MATE_THRESHOLD, MAX_PLY, is_mate_score, mate_in, mated_in};
use crate::search::stack::{NO_EVAL, PvTable, SearchStack};
use crate::search::tt::{Bound, TranspositionTable, TtEntry};

/// Nodes a worker counts locally before adding them to the shared total.
const NODE_BATCH: u64 = 1024;

/// Everything one search thread owns, plus references to what it shares.
pub(crate) struct SearchContext<'a> {
    pub(crate) id: usize,
    pub(crate) tt: &'a TranspositionTable,
    pub(crate) control: &'a SearchControl,
    pub(crate) params: &'a SearchParams,
    lmr: LmrTable,
    pub(crate) stack: SearchStack,
    pub(crate) pv: PvTable,
    pub(crate) history: HistoryTable,
    counters: CounterMoveTable,
    pub(crate) nodes: u64,
    unreported_nodes: u64,
    pub(crate) seldepth: usize,
    pub(crate) stats: SearchStats,
    /// Nominal depth of the running iteration; caps extensions per path.
    pub(crate) root_depth: i32,
    /// Best move of the last completed iteration, tried first at the root.
    pub(crate) root_hint: Move,
    /// Set once this worker observed the stop signal; results after that are discarded.
    pub(crate) aborted: bool,
    pub(crate) started: Instant,
}

impl<'a> SearchContext<'a> {
    pub(crate) fn new(
        id: usize,
        tt: &'a TranspositionTable,
        control: &'a SearchControl,
        params: &'a SearchParams,
    ) -> Self {
        Self {
            id,
            tt,
            control,
            params,
            lmr: params.lmr_table(),
            stack: SearchStack::new(),
            pv: PvTable::new(),
            history: HistoryTable::new(),
            counters: CounterMoveTable::new(),
            nodes: 0,
            unreported_nodes: 0,
            seldepth: 0,
            stats: SearchStats::default(),
            root_depth: 0,
            root_hint: Move::NULL,
            aborted: false,
            started: Instant::now(),
        }
    }

    /// Count a node and poll the stop signal. Returns `true` when the
    /// search must unwind.
    #[inline]
    pub(crate) fn enter_node(&mut self, ply: usize) -> bool {
        self.nodes += 1;
        self.unreported_nodes += 1;
        if self.unreported_nodes >= NODE_BATCH {
            self.flush_nodes();
        }
        self.seldepth = self.seldepth.max(ply);
        if !self.aborted && self.control.should_stop(self.nodes) {
            self.aborted = true;
        }
        self.aborted
    }

    pub(crate) fn flush_nodes(&mut self) {
        self.control.add_nodes(self.unreported_nodes);
        self.unreported_nodes = 0;
    }

    /// Search `pos` to `depth` plies with window `(alpha, beta)`.
    pub(crate) fn negamax(
        &mut self,
        pos: &mut Position,
        depth: i32,
        ply: usize,
        mut alpha: i32,
        mut beta: i32,
        is_pv: bool,
    ) -> i32 {
        debug_assert!(is_pv || beta - alpha <= 1, "non-PV node with window ({alpha}, {beta})");
        let root = ply == 0;
        let in_check = pos.is_in_check();
        self.pv.clear_ply(ply);

        if depth <= 0 && !in_check {
            return self.quiesce(pos, ply, alpha, beta, self.params.qs_max_depth);
        }
        if self.enter_node(ply) {
            return 0;
        }

        if !root {
            if pos.is_draw() {
                return DRAW;
            }
            if ply >= MAX_PLY - 1 {
                return pos.evaluate();
            }
            // No line from here can beat a mate already available nearer the root.
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        let excluded = self.stack[ply].excluded;
        let key = pos.hash();
        let tt_hit = if excluded.is_null() { self.tt.probe(key, ply) } else { None };
        // Non-PV windows are null windows, so a bound that would narrow one
        // empties it and `cutoff` already returns the score.
        if let Some(entry) = tt_hit {
            self.stats.tt_hits += 1;
            if !is_pv && let Some(score) = entry.cutoff(depth, alpha, beta) {
                self.stats.tt_cutoffs += 1;
                return score;
            }
        }
        let mut tt_move = tt_hit.map_or(Move::NULL, |e| e.best_move);
        if root && tt_move.is_null() {
            tt_move = self.root_hint;
        }

        let static_eval = if in_check {
            NO_EVAL
        } else {
            tt_hit.and_then(|e| e.eval).unwrap_or_else(|| pos.evaluate())
        };
        self.stack[ply].static_eval = static_eval;
        let improving = self.stack.improving(ply);

        if !is_pv && !in_check && excluded.is_null()
            && let Some(score) = self.prune_before_moves(pos, depth, ply, alpha, beta, static_eval, improving)
        {
            return score;
        }

        let p = self.params;
        let side = pos.side_to_move();
        let prev_move = if root { Move::NULL } else { self.stack[ply - 1].current_move };
        let mut picker = MovePicker::new(
            pos,
            tt_move,
            self.stack[ply].killers,
            self.counters.get(prev_move),
            self.id % 2 == 1,
        );
        let lmp_limit = ((p.lmp_base + depth * depth) / (2 - i32::from(improving))).max(1) as usize;

        let original_alpha = alpha;
        let mut best_score = -INF;
        let mut best_move = Move::NULL;
        let mut move_count = 0usize;
        let mut quiets_tried = MoveList::new();

        while let Some(mv) = picker.next_move(pos, &self.history) {
            if mv == excluded {
                continue;
            }
            move_count += 1;
            let quiet = pos.is_quiet(mv);
            let gives_check = pos.gives_check(mv);

            if !root && !is_pv && !in_check && !gives_check && best_score > -MATE_THRESHOLD {
                if quiet {
                    if p.lmp_enabled && depth <= p.lmp_max_depth && move_count > lmp_limit {
                        picker.skip_quiets();
                        continue;
                    }
                    if p.futility_enabled
                        && depth <= p.futility_max_depth
                        && static_eval + p.futility_base + p.futility_margin * depth <= alpha
                    {
                        continue;
                    }
                    if p.see_pruning_enabled
                        && depth <= p.see_max_depth
                        && !pos.see_ge(mv, p.see_quiet_margin * depth)
                    {
                        continue;
                    }
                } else if p.see_pruning_enabled
                    && depth <= p.see_max_depth
                    && !pos.see_ge(mv, p.see_capture_margin * depth * depth)
                {
                    continue;
                }
            }

            let mut extension = 0;
            if self.stack[ply].extensions < self.root_depth {
                if let Some(entry) = tt_hit
                    && mv == tt_move
                    && self.singular_candidate(&entry, depth, root, excluded)
                {
                    let singular_beta = entry.score - p.singular_margin * depth;
                    self.stack[ply].excluded = mv;
                    let score =
                        self.negamax(pos, (depth - 1) / 2, ply, singular_beta - 1, singular_beta, false);
                    self.stack[ply].excluded = Move::NULL;
                    if self.aborted {
                        return 0;
                    }
                    if score < singular_beta {
                        self.stats.singular_extensions += 1;
                        extension = 1;
                    }
                }
                if extension == 0
                    && ((p.check_extension && gives_check)
                        || (p.promotion_extension && pawn_reaches_seventh(pos, mv)))
                {
                    extension = 1;
                }
            }

            let reducible = p.lmr_enabled
                && depth >= p.lmr_min_depth
                && move_count > p.lmr_min_move_index
                && !in_check
                && !gives_check
                && mv.promotion().is_none()
                && !self.stack[ply].is_killer(mv)
                && (quiet || !pos.see_ge(mv, 0));

            let new_depth = depth - 1 + extension;
            self.stack[ply].current_move = mv;
            self.stack[ply + 1].extensions = self.stack[ply].extensions + extension;

            let undo = pos.make(mv);
            let score = if move_count == 1 {
                -self.negamax(pos, new_depth, ply + 1, -beta, -alpha, is_pv)
            } else {
                let reduction = if reducible {
                    let mut r = self.lmr.reduction(depth, move_count);
                    if !is_pv {
                        r += 1;
                    }
                    if improving {
                        r -= 1;
                    }
                    r.min(new_depth - 1).max(0)
                } else {
                    0
                };
                let mut s = -self.negamax(pos, new_depth - reduction, ply + 1, -alpha - 1, -alpha, false);
                if s > alpha && reduction > 0 && !self.aborted {
                    self.stats.lmr_researches += 1;
                    s = -self.negamax(pos, new_depth, ply + 1, -alpha - 1, -alpha, false);
                }
                if s > alpha && is_pv && !self.aborted {
                    s = -self.negamax(pos, new_depth, ply + 1, -beta, -alpha, true);
                }
                s
            };
            pos.unmake(undo);

            if self.aborted {
                return if best_move.is_null() { 0 } else { best_score };
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = mv;
                    if is_pv {
                        self.pv.update(ply, mv);
                    }
                    if score >= beta {
                        self.stats.beta_cutoffs += 1;
                        if move_count == 1 {
                            self.stats.first_move_cutoffs += 1;
                        }
                        if quiet {
                            self.stack[ply].store_killer(mv);
                            self.history.record_cutoff(side, mv, quiets_tried.as_slice(), depth);
                            self.counters.store(prev_move, mv);
                        }
                        break;
                    }
                    alpha = score;
                }
            }
            if quiet {
                quiets_tried.push(mv);
            }
        }

        if move_count == 0 {
            if !excluded.is_null() {
                return alpha;
            }
            return if in_check { mated_in(ply) } else { DRAW };
        }

        if excluded.is_null() {
            let bound = if best_score >= beta {
                Bound::LowerBound
            } else if best_score > original_alpha {
                Bound::Exact
            } else {
                Bound::UpperBound
            };
            self.tt.store(
                key,
                ply,
                TtEntry {
                    best_move,
                    depth: depth.clamp(0, u8::MAX as i32) as u8,
                    bound,
                    score: best_score,
                    eval: (static_eval != NO_EVAL).then_some(static_eval),
                    is_pv,
                },
            );
        }

        best_score
    }

    /// Reverse futility pruning, razoring and null-move pruning.
    #[allow(clippy::too_many_arguments)]
    fn prune_before_moves(
        &mut self,
        pos: &mut Position,
        depth: i32,
        ply: usize,
        alpha: i32,
        beta: i32,
        eval: i32,
        improving: bool,
    ) -> Option<i32> {
        let p = self.params;

        if p.rfp_enabled && depth <= p.rfp_max_depth && !is_mate_score(beta) {
            let margin = p.rfp_margin * (depth - i32::from(improving));
            if eval - margin >= beta {
                return Some(eval - margin);
            }
        }

        if p.razor_enabled && depth <= p.razor_max_depth && eval + p.razor_margin * depth <= alpha {
            let score = self.quiesce(pos, ply, alpha, alpha + 1, p.qs_max_depth);
            if self.aborted || score <= alpha {
                return Some(score);
            }
        }

        let after_null = ply > 0 && self.stack[ply - 1].null_moved;
        if p.nmp_enabled
            && depth >= p.nmp_min_depth
            && eval >= beta
            && !after_null
            && !is_mate_score(beta)
            && pos.has_non_pawn_material(pos.side_to_move())
        {
            let undo = pos.make_null()?;
            self.stats.null_move_tries += 1;
            let reduction = p.nmp_base_reduction + depth / p.nmp_depth_divisor;
            self.stack[ply].current_move = Move::NULL;
            self.stack[ply].null_moved = true;
            self.stack[ply + 1].extensions = self.stack[ply].extensions;
            let score = -self.negamax(pos, depth - 1 - reduction, ply + 1, -beta, -beta + 1, false);
            self.stack[ply].null_moved = false;
            pos.unmake_null(undo);

            if self.aborted {
                return Some(0);
            }
            if score >= beta {
                self.stats.null_move_cutoffs += 1;
                // An unverified mate from a null-move search is not trusted.
                return Some(if is_mate_score(score) { beta } else { score });
            }
        }
        None
    }

    fn singular_candidate(&self, entry: &TtEntry, depth: i32, root: bool, excluded: Move) -> bool {
        let p = self.params;
        p.singular_enabled
            && !root
            && excluded.is_null()
            && depth >= p.singular_min_depth
            && matches!(entry.bound, Bound::LowerBound | Bound::Exact)
            && entry.depth as i32 >= depth - 3
            && !is_mate_score(entry.score)
    }
}

/// A pawn push landing one step short of promotion.
fn pawn_reaches_seventh(pos: &Position, mv: Move) -> bool {
    if pos.moved_piece(mv) != Some(Piece::Pawn) {
        return false;
    }
    let rank = mv.dest().get_rank().to_index();
    match pos.side_to_move() {
        Color::White => rank == 6,
        Color::Black => rank == 1,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;

    /// Full-width minimax with the same leaves as the engine: quiescence at
    /// the horizon, draws by rule, mate and stalemate scores.
    fn reference(ctx: &mut SearchContext<'_>, pos: &mut Position, depth: i32, ply: usize) -> i32 {
        let in_check = pos.is_in_check();
        if depth <= 0 && !in_check {
            return ctx.quiesce(pos, ply, -INF, INF, ctx.params.qs_max_depth);
        }
        if ply > 0 && pos.is_draw() {
            return DRAW;
        }
        let moves = pos.legal_moves();
        if moves.is_empty() {
            return if in_check { mated_in(ply) } else { DRAW };
        }
        let mut best = -INF;
        for &mv in moves.iter() {
            let undo = pos.make(mv);
            best = best.max(-reference(ctx, pos, depth - 1, ply + 1));
            pos.unmake(undo);
        }
        best
    }

    fn pvs_score(fen: &str, depth: i32) -> (i32, i32) {
        let params = SearchParams::plain();
        let tt = TranspositionTable::new(4);
        let control = SearchControl::new_infinite(Arc::new(AtomicBool::new(false)));
        let mut pos = Position::from_fen(fen).unwrap();

        let mut ctx = SearchContext::new(0, &tt, &control, &params);
        let mut score = 0;
        for d in 1..=depth {
            ctx.root_depth = d;
            score = ctx.negamax(&mut pos, d, 0, -INF, INF, true);
        }

        let mut fresh = SearchContext::new(0, &tt, &control, &params);
        let expected = reference(&mut fresh, &mut pos, depth, 0);
        (score, expected)
    }

    #[test]
    fn plain_pvs_matches_full_width_minimax() {
        for fen in [
            "4k3/8/3p4/4p3/4P3/3P4/8/4K3 w - - 0 1",
            "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
            "r3k3/8/8/3q4/8/2N5/8/3QK3 b - - 0 1",
            "8/2k5/8/3Pp3/8/8/5K2/8 w - e6 0 1",
        ] {
            let (score, expected) = pvs_score(fen, 3);
            assert_eq!(score, expected, "{fen}");
        }
    }

    #[test]
    fn pawn_push_to_seventh_is_detected() {
        let pos = Position::from_fen("4k3/8/1P6/8/8/8/6p1/4K3 w - - 0 1").unwrap();
        assert!(pawn_reaches_seventh(&pos, pos.parse_uci_move("b6b7").unwrap()));
        assert!(!pawn_reaches_seventh(&pos, pos.parse_uci_move("e1d2").unwrap()));

        let black = Position::from_fen("4k3/8/8/8/8/6p1/8/4K3 b - - 0 1").unwrap();
        assert!(pawn_reaches_seventh(&black, black.parse_uci_move("g3g2").unwrap()));
    }

    #[test]
    fn null_move_never_tried_without_pieces() {
        let params = SearchParams::default();
        let tt = TranspositionTable::new(4);
        let control = SearchControl::new_infinite(Arc::new(AtomicBool::new(false)));
        let mut pos = Position::from_fen("8/8/4k3/8/8/4K3/4P3/8 w - - 0 1").unwrap();
        let mut ctx = SearchContext::new(0, &tt, &control, &params);
        for d in 1..=6 {
            ctx.root_depth = d;
            ctx.negamax(&mut pos, d, 0, -INF, INF, true);
        }
        assert_eq!(ctx.stats.null_move_tries, 0);
    }

    #[test]
    fn null_move_tried_when_a_rook_is_on_board() {
        let params = SearchParams::default();
        let tt = TranspositionTable::new(4);
        let control = SearchControl::new_infinite(Arc::new(AtomicBool::new(false)));
        let mut pos = Position::from_fen("8/8/4k3/8/8/4K3/4P3/7R w - - 0 1").unwrap();
        let mut ctx = SearchContext::new(0, &tt, &control, &params);
        for d in 1..=6 {
            ctx.root_depth = d;
            ctx.negamax(&mut pos, d, 0, -INF, INF, true);
        }
        assert!(ctx.stats.null_move_tries > 0);
    }

    #[test]
    fn stalemate_and_checkmate_leaves() {
        let params = SearchParams::default();
        let tt = TranspositionTable::new(1);
        let control = SearchControl::new_infinite(Arc::new(AtomicBool::new(false)));
        let mut ctx = SearchContext::new(0, &tt, &control, &params);

        let mut stalemate = Position::from_fen("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(ctx.negamax(&mut stalemate, 3, 0, -INF, INF, true), DRAW);

        let mut mated = Position::from_fen("7k/6Q1/5K2/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(ctx.negamax(&mut mated, 3, 0, -INF, INF, true), mated_in(0));
    }
}
