//! Quiet-move ordering tables: history and counter moves.
//!
//! Both are owned by one search worker and live for one search call.
//! Killer moves are per ply and sit in the search stack instead.

use kestrel_core::{Color, Move};

/// History scores stay within `±HISTORY_MAX`.
pub const HISTORY_MAX: i32 = 16_384;

/// Largest single history adjustment.
const MAX_BONUS: i32 = 1_200;

/// History bonus for a cutoff at `depth`.
#[inline]
pub fn history_bonus(depth: i32) -> i32 {
    (depth * depth).min(MAX_BONUS)
}

/// Butterfly history indexed by `[side][from][to]`.
///
/// Updates use gravity, `h += b - h * |b| / HISTORY_MAX`, which keeps every
/// entry inside `±HISTORY_MAX` and lets old information fade.
pub struct HistoryTable {
    table: Box<[[[i32; 64]; 64]; 2]>,
}

impl HistoryTable {
    pub fn new() -> Self {
        Self {
            table: Box::new([[[0; 64]; 64]; 2]),
        }
    }

    #[inline]
    fn entry(&mut self, side: Color, mv: Move) -> &mut i32 {
        &mut self.table[side.to_index()][mv.source().to_index()][mv.dest().to_index()]
    }

    /// Apply a bonus (positive) or malus (negative).
    pub fn update(&mut self, side: Color, mv: Move, delta: i32) {
        let delta = delta.clamp(-MAX_BONUS, MAX_BONUS);
        let entry = self.entry(side, mv);
        *entry += delta - *entry * delta.abs() / HISTORY_MAX;
    }

    /// Reward the quiet move that caused a cutoff and penalise the quiet
    /// moves tried before it.
    pub fn record_cutoff(&mut self, side: Color, best: Move, tried: &[Move], depth: i32) {
        let bonus = history_bonus(depth);
        self.update(side, best, bonus);
        for &mv in tried.iter().filter(|&&mv| mv != best) {
            self.update(side, mv, -bonus);
        }
    }

    #[inline]
    pub fn score(&self, side: Color, mv: Move) -> i32 {
        self.table[side.to_index()][mv.source().to_index()][mv.dest().to_index()]
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Refutations indexed by the opponent's previous move `[from][to]`.
pub struct CounterMoveTable {
    table: Box<[[Move; 64]; 64]>,
}

impl CounterMoveTable {
    pub fn new() -> Self {
        Self {
            table: Box::new([[Move::NULL; 64]; 64]),
        }
    }

    pub fn store(&mut self, previous: Move, reply: Move) {
        if !previous.is_null() {
            self.table[previous.source().to_index()][previous.dest().to_index()] = reply;
        }
    }

    /// The stored reply to `previous`, or [`Move::NULL`].
    pub fn get(&self, previous: Move) -> Move {
        if previous.is_null() {
            return Move::NULL;
        }
        self.table[previous.source().to_index()][previous.dest().to_index()]
    }
}

impl Default for CounterMoveTable {
    fn default() -> Self {
        Self::new()
    }
}
