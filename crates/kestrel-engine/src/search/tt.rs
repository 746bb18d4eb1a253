//! Shared transposition table with lockless XOR verification.
//!
//! Each slot is two `AtomicU64` words: the packed entry (`data`) and
//! `check = key ^ data`. Writers store `data` first and `check` second;
//! readers accept a slot only when `data ^ check` reproduces the full
//! 64-bit key. A slot torn by two concurrent writers fails the check and
//! reads as a miss. All accesses use `Relaxed` ordering.
//!
//! ```text
//! data:
//!   bits  0-15  best move (Move::raw)
//!   bits 16-31  score (i16, mate scores relative to the node)
//!   bits 32-47  static eval (i16, i16::MIN = none)
//!   bits 48-55  depth
//!   bits 56-57  bound
//!   bit  58     written from a PV node
//!   bits 59-63  generation
//! ```
//!
//! Slots are grouped in buckets of two sharing one index.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use kestrel_core::Move;
use tracing::info;

use crate::search::score::MATE_THRESHOLD;

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

const SLOTS_PER_BUCKET: usize = 2;
const GENERATION_MASK: u8 = 0x1F;
const NO_EVAL: i16 = i16::MIN;
/// Buckets sampled by [`TranspositionTable::hashfull`].
const HASHFULL_SAMPLE: usize = 500;
/// Extra plies of depth credited to PV entries when choosing what to keep.
const PV_DEPTH_BONUS: i32 = 2;

/// Kind of score stored in an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Empty slot.
    None = 0,
    /// The score is exact.
    Exact = 1,
    /// The search failed high; the true score is at least this.
    LowerBound = 2,
    /// The search failed low; the true score is at most this.
    UpperBound = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0x3 {
            1 => Bound::Exact,
            2 => Bound::LowerBound,
            3 => Bound::UpperBound,
            _ => Bound::None,
        }
    }
}

/// One position's worth of cached search knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    pub best_move: Move,
    pub depth: u8,
    pub bound: Bound,
    /// Root-relative score.
    pub score: i32,
    pub eval: Option<i32>,
    pub is_pv: bool,
}

impl TtEntry {
    /// The score to return without searching a node at `depth` with window
    /// `(alpha, beta)`, if this entry settles it.
    pub fn cutoff(&self, depth: i32, alpha: i32, beta: i32) -> Option<i32> {
        if (self.depth as i32) < depth {
            return None;
        }
        match self.bound {
            Bound::Exact => Some(self.score),
            Bound::LowerBound if self.score >= beta => Some(self.score),
            Bound::UpperBound if self.score <= alpha => Some(self.score),
            _ => None,
        }
    }
}

/// Make a mate score relative to the node at `ply` so it can be reused at
/// any depth of the tree.
pub fn score_to_tt(score: i32, ply: usize) -> i16 {
    let adjusted = if score >= MATE_THRESHOLD {
        score + ply as i32
    } else if score <= -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    };
    adjusted as i16
}

/// Inverse of [`score_to_tt`] for a node at `ply`.
pub fn score_from_tt(score: i16, ply: usize) -> i32 {
    let score = score as i32;
    if score >= MATE_THRESHOLD {
        score - ply as i32
    } else if score <= -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

#[derive(Clone, Copy)]
struct Packed(u64);

impl Packed {
    fn new(mv: Move, score: i16, eval: i16, depth: u8, bound: Bound, is_pv: bool, generation: u8) -> Self {
        Packed(
            mv.raw() as u64
                | (score as u16 as u64) << 16
                | (eval as u16 as u64) << 32
                | (depth as u64) << 48
                | (bound as u64) << 56
                | (is_pv as u64) << 58
                | ((generation & GENERATION_MASK) as u64) << 59,
        )
    }

    fn best_move(self) -> Move {
        Move::from_raw(self.0 as u16)
    }

    fn score(self) -> i16 {
        (self.0 >> 16) as u16 as i16
    }

    fn eval(self) -> i16 {
        (self.0 >> 32) as u16 as i16
    }

    fn depth(self) -> u8 {
        (self.0 >> 48) as u8
    }

    fn bound(self) -> Bound {
        Bound::from_bits(self.0 >> 56)
    }

    fn is_pv(self) -> bool {
        (self.0 >> 58) & 1 != 0
    }

    fn generation(self) -> u8 {
        (self.0 >> 59) as u8 & GENERATION_MASK
    }

    /// Depth used by replacement decisions.
    fn weight(self) -> i32 {
        self.depth() as i32 + if self.is_pv() { PV_DEPTH_BONUS } else { 0 }
    }
}

struct Slot {
    data: AtomicU64,
    check: AtomicU64,
}

impl Slot {
    const fn new() -> Self {
        Self {
            data: AtomicU64::new(0),
            check: AtomicU64::new(0),
        }
    }

    /// The slot's entry if it holds `key` and was not torn.
    fn read(&self, key: u64) -> Option<Packed> {
        let data = self.data.load(Ordering::Relaxed);
        let check = self.check.load(Ordering::Relaxed);
        let packed = Packed(data);
        (data ^ check == key && packed.bound() != Bound::None).then_some(packed)
    }

    fn peek(&self) -> Packed {
        Packed(self.data.load(Ordering::Relaxed))
    }

    fn write(&self, key: u64, packed: Packed) {
        self.data.store(packed.0, Ordering::Relaxed);
        self.check.store(key ^ packed.0, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.data.store(0, Ordering::Relaxed);
        self.check.store(0, Ordering::Relaxed);
    }
}

#[repr(align(32))]
struct Bucket {
    slots: [Slot; SLOTS_PER_BUCKET],
}

impl Bucket {
    const fn new() -> Self {
        Self {
            slots: [Slot::new(), Slot::new()],
        }
    }
}

/// Lockless transposition table shared by every search thread.
pub struct TranspositionTable {
    buckets: Box<[Bucket]>,
    mask: u64,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Allocate roughly `mb` megabytes, rounded down to a power-of-two bucket count.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let count = (bytes / std::mem::size_of::<Bucket>()).max(1);
        let count = if count.is_power_of_two() { count } else { count.next_power_of_two() >> 1 };
        let buckets: Box<[Bucket]> = (0..count).map(|_| Bucket::new()).collect();
        info!(mb, buckets = count, "transposition table allocated");
        Self {
            buckets,
            mask: (count - 1) as u64,
            generation: AtomicU8::new(0),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.buckets.len() * SLOTS_PER_BUCKET
    }

    /// Empty every slot and reset the generation.
    pub fn clear(&self) {
        for slot in self.buckets.iter().flat_map(|b| b.slots.iter()) {
            slot.clear();
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Start a new search generation. Entries from older generations become
    /// the first candidates for replacement.
    pub fn new_generation(&self) {
        let next = self.generation().wrapping_add(1) & GENERATION_MASK;
        self.generation.store(next, Ordering::Relaxed);
    }

    fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    #[inline]
    fn bucket(&self, key: u64) -> &Bucket {
        &self.buckets[(key & self.mask) as usize]
    }

    /// Look up `key` for a node at `ply`.
    pub fn probe(&self, key: u64, ply: usize) -> Option<TtEntry> {
        let packed = self.bucket(key).slots.iter().find_map(|slot| slot.read(key))?;
        let eval = packed.eval();
        Some(TtEntry {
            best_move: packed.best_move(),
            depth: packed.depth(),
            bound: packed.bound(),
            score: score_from_tt(packed.score(), ply),
            eval: (eval != NO_EVAL).then_some(eval as i32),
            is_pv: packed.is_pv(),
        })
    }

    /// Record the result of searching the node `key` at `ply`.
    ///
    /// An existing entry for the same position from this generation is kept
    /// when it is more than two plies deeper, unless the new bound is exact.
    /// Otherwise the bucket slot holding the least valuable entry (empty,
    /// then stale generation, then shallowest) is overwritten. PV entries
    /// count as two plies deeper than they are in both decisions.
    pub fn store(&self, key: u64, ply: usize, entry: TtEntry) {
        let generation = self.generation();
        let bucket = self.bucket(key);
        let eval = entry.eval.map_or(NO_EVAL, |e| e.clamp(-(i16::MAX as i32), i16::MAX as i32) as i16);
        let pack = |mv: Move| {
            Packed::new(
                mv,
                score_to_tt(entry.score, ply),
                eval,
                entry.depth,
                entry.bound,
                entry.is_pv,
                generation,
            )
        };

        if let Some((slot, existing)) = bucket
            .slots
            .iter()
            .find_map(|slot| slot.read(key).map(|packed| (slot, packed)))
        {
            let incoming = entry.depth as i32 + if entry.is_pv { PV_DEPTH_BONUS } else { 0 };
            let keep_existing = entry.bound != Bound::Exact
                && existing.generation() == generation
                && incoming + 2 < existing.weight();
            if keep_existing {
                return;
            }
            let mv = if entry.best_move.is_null() { existing.best_move() } else { entry.best_move };
            slot.write(key, pack(mv));
            return;
        }

        let worth = |packed: Packed| match packed.bound() {
            Bound::None => i32::MIN,
            _ if packed.generation() != generation => packed.weight() - 256,
            _ => packed.weight(),
        };
        let victim = bucket
            .slots
            .iter()
            .min_by_key(|slot| worth(slot.peek()))
            .unwrap_or(&bucket.slots[0]);
        victim.write(key, pack(entry.best_move));
    }

    /// Permille of sampled slots holding an entry from the current generation.
    pub fn hashfull(&self) -> u16 {
        let generation = self.generation();
        let sample = &self.buckets[..self.buckets.len().min(HASHFULL_SAMPLE)];
        let slots = sample.len() * SLOTS_PER_BUCKET;
        let used = sample
            .iter()
            .flat_map(|b| b.slots.iter())
            .map(Slot::peek)
            .filter(|p| p.bound() != Bound::None && p.generation() == generation)
            .count();
        (used * 1000 / slots.max(1)) as u16
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("buckets", &self.buckets.len())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::Square;

    use super::*;
    use crate::search::score::{MATE_SCORE, mate_in, mated_in};

    fn entry(mv: Move, depth: u8, score: i32, bound: Bound) -> TtEntry {
        TtEntry {
            best_move: mv,
            depth,
            bound,
            score,
            eval: Some(17),
            is_pv: false,
        }
    }

    fn e2e4() -> Move {
        Move::new(Square::E2, Square::E4)
    }

    fn d2d4() -> Move {
        Move::new(Square::D2, Square::D4)
    }

    #[test]
    fn bucket_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Bucket>(), 32);
    }

    #[test]
    fn store_then_probe_returns_the_entry() {
        let tt = TranspositionTable::new(1);
        let key = 0xDEAD_BEEF_1234_5678;
        tt.store(key, 0, entry(e2e4(), 6, -42, Bound::Exact));

        let hit = tt.probe(key, 0).unwrap();
        assert_eq!(hit.best_move, e2e4());
        assert_eq!(hit.depth, 6);
        assert_eq!(hit.bound, Bound::Exact);
        assert_eq!(hit.score, -42);
        assert_eq!(hit.eval, Some(17));
    }

    #[test]
    fn missing_eval_round_trips_as_none() {
        let tt = TranspositionTable::new(1);
        let mut e = entry(e2e4(), 2, 0, Bound::UpperBound);
        e.eval = None;
        tt.store(7, 0, e);
        assert_eq!(tt.probe(7, 0).unwrap().eval, None);
    }

    #[test]
    fn different_key_in_same_bucket_misses() {
        let tt = TranspositionTable::new(1);
        let key = 0x0123_4567_89AB_CDEF;
        tt.store(key, 0, entry(e2e4(), 3, 10, Bound::Exact));
        let alias = key ^ 0xFFFF_0000_0000_0000;
        assert!(tt.probe(alias, 0).is_none());
        assert!(tt.probe(0x1111, 0).is_none());
    }

    #[test]
    fn exact_entry_only_cuts_at_sufficient_depth() {
        let e = entry(e2e4(), 5, 30, Bound::Exact);
        assert_eq!(e.cutoff(5, -100, 100), Some(30));
        assert_eq!(e.cutoff(3, -100, 100), Some(30));
        assert_eq!(e.cutoff(6, -100, 100), None);
    }

    #[test]
    fn bounds_cut_only_outside_the_window() {
        let lower = entry(e2e4(), 5, 80, Bound::LowerBound);
        assert_eq!(lower.cutoff(4, 0, 50), Some(80));
        assert_eq!(lower.cutoff(4, 0, 100), None);

        let upper = entry(e2e4(), 5, -20, Bound::UpperBound);
        assert_eq!(upper.cutoff(4, 0, 50), Some(-20));
        assert_eq!(upper.cutoff(4, -50, 50), None);
    }

    #[test]
    fn narrowing_bounds_on_a_null_window_always_cut() {
        let alpha = 40;
        for score in [-300, 0, 39, 40, 41, 42, 500] {
            let lower = entry(e2e4(), 4, score, Bound::LowerBound);
            let upper = entry(e2e4(), 4, score, Bound::UpperBound);
            // A lower bound above alpha or an upper bound below beta leaves nothing to search.
            assert_eq!(lower.cutoff(4, alpha, alpha + 1).is_some(), score > alpha, "lower {score}");
            assert_eq!(upper.cutoff(4, alpha, alpha + 1).is_some(), score < alpha + 1, "upper {score}");
        }
    }

    #[test]
    fn mate_scores_are_rebased_by_ply() {
        // Mate found 3 plies below a node at ply 5 is mate in 8 from the root.
        let at_ply_5 = mate_in(8);
        let stored = score_to_tt(at_ply_5, 5);
        assert_eq!(stored as i32, MATE_SCORE - 3);
        // The same position reached at ply 2 is mate in 5 from that root.
        assert_eq!(score_from_tt(stored, 2), mate_in(5));

        let mated = mated_in(9);
        assert_eq!(score_from_tt(score_to_tt(mated, 4), 4), mated);
        assert_eq!(score_from_tt(score_to_tt(-250, 30), 12), -250);
    }

    #[test]
    fn shallow_same_generation_does_not_evict_deep_entry() {
        let tt = TranspositionTable::new(1);
        let key = 0xAAAA_BBBB_CCCC_DDDD;
        tt.store(key, 0, entry(e2e4(), 12, 100, Bound::LowerBound));
        tt.store(key, 0, entry(d2d4(), 3, 5, Bound::UpperBound));
        assert_eq!(tt.probe(key, 0).unwrap().depth, 12);

        // An exact result always replaces.
        tt.store(key, 0, entry(d2d4(), 3, 5, Bound::Exact));
        assert_eq!(tt.probe(key, 0).unwrap().best_move, d2d4());
    }

    #[test]
    fn stale_generation_is_overwritten() {
        let tt = TranspositionTable::new(1);
        let key = 0xAAAA_BBBB_CCCC_DDDD;
        tt.store(key, 0, entry(e2e4(), 12, 100, Bound::LowerBound));
        tt.new_generation();
        tt.store(key, 0, entry(d2d4(), 1, 5, Bound::UpperBound));
        let hit = tt.probe(key, 0).unwrap();
        assert_eq!(hit.depth, 1);
        assert_eq!(hit.best_move, d2d4());
    }

    #[test]
    fn null_move_keeps_previous_best_move() {
        let tt = TranspositionTable::new(1);
        tt.store(99, 0, entry(e2e4(), 4, 0, Bound::LowerBound));
        tt.store(99, 0, entry(Move::NULL, 6, -10, Bound::UpperBound));
        let hit = tt.probe(99, 0).unwrap();
        assert_eq!(hit.depth, 6);
        assert_eq!(hit.best_move, e2e4());
    }

    #[test]
    fn both_bucket_slots_are_used() {
        let tt = TranspositionTable::new(1);
        let a = 0x10;
        let b = a | 1 << 40;
        tt.store(a, 0, entry(e2e4(), 9, 1, Bound::Exact));
        tt.store(b, 0, entry(d2d4(), 2, 2, Bound::Exact));
        assert!(tt.probe(a, 0).is_some());
        assert!(tt.probe(b, 0).is_some());
    }

    #[test]
    fn pv_entries_outlast_equally_deep_ones() {
        let tt = TranspositionTable::new(1);
        let pv_key = 0x20;
        let other_key = pv_key | 1 << 40;
        let newcomer = pv_key | 1 << 41;
        tt.store(pv_key, 0, TtEntry { is_pv: true, ..entry(e2e4(), 5, 1, Bound::Exact) });
        tt.store(other_key, 0, entry(d2d4(), 6, 2, Bound::Exact));
        tt.store(newcomer, 0, entry(d2d4(), 1, 3, Bound::UpperBound));

        assert!(tt.probe(pv_key, 0).unwrap().is_pv);
        assert!(tt.probe(other_key, 0).is_none());
        assert!(tt.probe(newcomer, 0).is_some());
    }

    #[test]
    fn pv_entry_resists_slightly_shallower_overwrite() {
        let tt = TranspositionTable::new(1);
        let key = 0x1234_5678_9ABC_DEF0;
        tt.store(key, 0, TtEntry { is_pv: true, ..entry(e2e4(), 6, 1, Bound::LowerBound) });
        // A depth-4 result would replace a plain depth-6 entry.
        tt.store(key, 0, entry(d2d4(), 4, 2, Bound::UpperBound));
        assert_eq!(tt.probe(key, 0).unwrap().best_move, e2e4());
    }

    #[test]
    fn torn_slot_reads_as_miss() {
        let tt = TranspositionTable::new(1);
        let key = 0x5555_6666_7777_8888;
        tt.store(key, 0, entry(e2e4(), 4, 12, Bound::Exact));

        // Simulate a second writer that got only its data word in.
        let slot = &tt.bucket(key).slots[0];
        let other = Packed::new(d2d4(), 99, 0, 9, Bound::Exact, false, 0);
        slot.data.store(other.0, Ordering::Relaxed);
        assert!(tt.probe(key, 0).is_none());
    }

    #[test]
    fn clear_empties_the_table() {
        let tt = TranspositionTable::new(1);
        tt.store(42, 0, entry(e2e4(), 4, 0, Bound::Exact));
        assert_eq!(tt.hashfull(), 1);
        tt.clear();
        assert!(tt.probe(42, 0).is_none());
        assert_eq!(tt.hashfull(), 0);
    }

    #[test]
    fn concurrent_writers_never_yield_foreign_entries() {
        let tt = TranspositionTable::new(1);
        let keys: Vec<u64> = (0..64u64).map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1).collect();

        std::thread::scope(|s| {
            for t in 0..4u8 {
                let tt = &tt;
                let keys = &keys;
                s.spawn(move || {
                    for round in 0..2000usize {
                        let key = keys[(round + t as usize) % keys.len()];
                        // Each key always stores its own depth, so any hit must carry it.
                        let depth = (key % 200) as u8;
                        tt.store(key, 0, entry(e2e4(), depth, t as i32, Bound::Exact));
                        if let Some(hit) = tt.probe(key, 0) {
                            assert_eq!(hit.depth, depth);
                        }
                    }
                });
            }
        });
    }
}
