//! Per-ply search state and the principal variation table.

use std::ops::{Index, IndexMut};

use kestrel_core::Move;

use crate::search::score::MAX_PLY;

/// Marker for "no static evaluation" (side to move in check).
pub const NO_EVAL: i32 = i32::MIN;

/// State kept for one ply of the current path.
#[derive(Debug, Clone, Copy)]
pub struct StackEntry {
    /// Static evaluation of the node, [`NO_EVAL`] when in check.
    pub static_eval: i32,
    /// Quiet moves that caused a cutoff at this ply.
    pub killers: [Move; 2],
    /// Move being searched from this ply (null for a null move).
    pub current_move: Move,
    /// The node at this ply passed instead of moving.
    pub null_moved: bool,
    /// Move excluded by a singular-extension verification search.
    pub excluded: Move,
    /// Extensions granted along the path to this ply.
    pub extensions: i32,
}

impl StackEntry {
    const EMPTY: StackEntry = StackEntry {
        static_eval: NO_EVAL,
        killers: [Move::NULL; 2],
        current_move: Move::NULL,
        null_moved: false,
        excluded: Move::NULL,
        extensions: 0,
    };

    /// Remember a quiet cutoff move, keeping the previous one as second killer.
    pub fn store_killer(&mut self, mv: Move) {
        if self.killers[0] != mv {
            self.killers[1] = self.killers[0];
            self.killers[0] = mv;
        }
    }

    pub fn is_killer(&self, mv: Move) -> bool {
        !mv.is_null() && self.killers.contains(&mv)
    }
}

/// One [`StackEntry`] per ply, with headroom past [`MAX_PLY`].
pub struct SearchStack {
    entries: Box<[StackEntry; MAX_PLY + 2]>,
}

impl SearchStack {
    pub fn new() -> Self {
        Self {
            entries: Box::new([StackEntry::EMPTY; MAX_PLY + 2]),
        }
    }

    /// Whether the side to move at `ply` stands better than two plies ago.
    pub fn improving(&self, ply: usize) -> bool {
        let now = self.entries[ply].static_eval;
        if ply < 2 || now == NO_EVAL {
            return false;
        }
        let before = self.entries[ply - 2].static_eval;
        before == NO_EVAL || now > before
    }
}

impl Default for SearchStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for SearchStack {
    type Output = StackEntry;

    fn index(&self, ply: usize) -> &StackEntry {
        &self.entries[ply]
    }
}

impl IndexMut<usize> for SearchStack {
    fn index_mut(&mut self, ply: usize) -> &mut StackEntry {
        &mut self.entries[ply]
    }
}

/// Triangular principal variation table.
///
/// Row `ply` holds the best line found from that ply; updating a ply copies
/// the child's row behind the new move.
pub struct PvTable {
    moves: Box<[[Move; MAX_PLY]; MAX_PLY]>,
    len: [usize; MAX_PLY],
}

impl PvTable {
    pub fn new() -> Self {
        Self {
            moves: Box::new([[Move::NULL; MAX_PLY]; MAX_PLY]),
            len: [0; MAX_PLY],
        }
    }

    #[inline]
    pub fn clear_ply(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.len[ply] = 0;
        }
    }

    /// Set `mv` as the best move at `ply`, followed by the line from `ply + 1`.
    pub fn update(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        self.moves[ply][0] = mv;
        let child_len = if ply + 1 < MAX_PLY { self.len[ply + 1] } else { 0 };
        let copy = child_len.min(MAX_PLY - 1);
        if copy > 0 {
            let (upper, lower) = self.moves.split_at_mut(ply + 1);
            upper[ply][1..=copy].copy_from_slice(&lower[0][..copy]);
        }
        self.len[ply] = copy + 1;
    }

    /// The line from the root.
    pub fn root_pv(&self) -> &[Move] {
        &self.moves[0][..self.len[0]]
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::Square;

    use super::*;

    #[test]
    fn killers_shift_and_ignore_duplicates() {
        let mut e = StackEntry::EMPTY;
        let a = Move::new(Square::E2, Square::E4);
        let b = Move::new(Square::D2, Square::D4);
        e.store_killer(a);
        e.store_killer(b);
        e.store_killer(b);
        assert_eq!(e.killers, [b, a]);
        assert!(e.is_killer(a));
        assert!(!e.is_killer(Move::NULL));
    }

    #[test]
    fn improving_compares_two_plies_back() {
        let mut s = SearchStack::new();
        s[0].static_eval = 10;
        s[2].static_eval = 30;
        assert!(s.improving(2));
        s[2].static_eval = 5;
        assert!(!s.improving(2));
        s[0].static_eval = NO_EVAL;
        assert!(s.improving(2));
        assert!(!s.improving(1));
    }

    #[test]
    fn pv_collects_child_lines() {
        let mut pv = PvTable::new();
        let m = |a, b| Move::new(a, b);
        pv.clear_ply(2);
        pv.update(2, m(Square::G8, Square::F6));
        pv.update(1, m(Square::E7, Square::E5));
        pv.update(0, m(Square::E2, Square::E4));
        assert_eq!(
            pv.root_pv(),
            &[m(Square::E2, Square::E4), m(Square::E7, Square::E5), m(Square::G8, Square::F6)]
        );

        pv.clear_ply(1);
        pv.update(0, m(Square::D2, Square::D4));
        assert_eq!(pv.root_pv(), &[m(Square::D2, Square::D4)]);
    }
}
