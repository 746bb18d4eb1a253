//! Search: iterative deepening over a PVS core, shared by Lazy SMP workers.

pub mod control;
pub mod heuristics;
pub(crate) mod negamax;
pub mod ordering;
pub mod params;
pub mod pool;
mod qsearch;
pub mod score;
pub mod stack;
pub mod tt;

use std::time::Duration;

use kestrel_core::{Move, Position};
use tracing::{debug, trace};

use negamax::SearchContext;
use ordering::MovePicker;
use score::{INF, MAX_DEPTH, Score, is_mate_score};

/// Outcome of a search: the deepest completed iteration.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best move of the deepest completed iteration.
    pub best_move: Move,
    /// Expected reply, the second move of the PV.
    pub ponder_move: Option<Move>,
    pub pv: Vec<Move>,
    /// Score from the side to move's point of view.
    pub score: i32,
    /// Deepest completed iteration; 0 when stopped before depth 1 finished.
    pub depth: u8,
    pub seldepth: u8,
    /// Nodes searched by all workers.
    pub nodes: u64,
    pub stats: SearchStats,
    pub elapsed: Duration,
}

impl SearchResult {
    /// Score in display form.
    pub fn display_score(&self) -> Score {
        Score::from_internal(self.score)
    }
}

/// Progress report for one completed iteration of the main worker.
#[derive(Debug, Clone, Copy)]
pub struct SearchInfo<'a> {
    pub depth: u8,
    pub seldepth: u8,
    pub score: Score,
    pub nodes: u64,
    pub nps: u64,
    pub elapsed: Duration,
    /// Table occupancy in permille.
    pub hashfull: u16,
    pub pv: &'a [Move],
}

/// Counters for tuning and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub tt_hits: u64,
    pub tt_cutoffs: u64,
    pub null_move_tries: u64,
    pub null_move_cutoffs: u64,
    pub lmr_researches: u64,
    pub singular_extensions: u64,
    pub beta_cutoffs: u64,
    pub first_move_cutoffs: u64,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.tt_hits += other.tt_hits;
        self.tt_cutoffs += other.tt_cutoffs;
        self.null_move_tries += other.null_move_tries;
        self.null_move_cutoffs += other.null_move_cutoffs;
        self.lmr_researches += other.lmr_researches;
        self.singular_extensions += other.singular_extensions;
        self.beta_cutoffs += other.beta_cutoffs;
        self.first_move_cutoffs += other.first_move_cutoffs;
    }

    /// Share of cutoffs produced by the first move tried, in percent.
    pub fn first_move_cutoff_rate(&self) -> f64 {
        if self.beta_cutoffs == 0 {
            return 0.0;
        }
        self.first_move_cutoffs as f64 * 100.0 / self.beta_cutoffs as f64
    }
}

/// Tracks best-move stability across iterations to scale the soft time limit.
///
/// A falling score or a changing best move asks for more time; a move that
/// survived several iterations lets the engine move sooner.
pub(crate) struct StabilityTracker {
    last_move: Move,
    last_score: i32,
    stable_streak: u32,
}

impl StabilityTracker {
    pub(crate) fn new() -> Self {
        Self {
            last_move: Move::NULL,
            last_score: 0,
            stable_streak: 0,
        }
    }

    /// Feed one iteration's result; returns the soft limit scale in hundredths.
    pub(crate) fn update(&mut self, best_move: Move, score: i32) -> i32 {
        let scale = if self.last_move.is_null() {
            100
        } else {
            let drop = self.last_score - score;
            if drop > 100 {
                self.stable_streak = 0;
                250
            } else if drop > 50 {
                self.stable_streak = 0;
                180
            } else if best_move == self.last_move {
                self.stable_streak += 1;
                if self.stable_streak >= 3 { 60 } else { 100 }
            } else {
                self.stable_streak = 0;
                100
            }
        };
        self.last_move = best_move;
        self.last_score = score;
        scale
    }
}

struct Completed {
    score: i32,
    depth: u8,
    seldepth: u8,
    pv: Vec<Move>,
}

impl SearchContext<'_> {
    /// Iterative deepening from `start_depth` to `max_depth`.
    ///
    /// Each iteration that finishes replaces the result; one interrupted by
    /// the stop signal is thrown away. `on_info` runs after every completed
    /// iteration.
    pub(crate) fn iterate<F>(&mut self, root: &Position, max_depth: u8, start_depth: u8, mut on_info: F) -> SearchResult
    where
        F: FnMut(&SearchInfo<'_>),
    {
        let mut pos = root.clone();
        let max_depth = max_depth.clamp(1, MAX_DEPTH);
        let start_depth = start_depth.clamp(1, max_depth);
        let mut stability = StabilityTracker::new();
        let mut completed: Option<Completed> = None;
        let mut prev_score = 0;

        for depth in start_depth..=max_depth {
            // Time and node limits only apply once there is a move to report.
            let stop = if completed.is_some() {
                self.control.should_stop_iterating()
            } else {
                self.control.is_stopped()
            };
            if stop {
                break;
            }

            self.root_depth = i32::from(depth);
            self.seldepth = 0;
            let score = self.aspiration(&mut pos, i32::from(depth), prev_score);
            if self.aborted {
                break;
            }
            let pv = self.pv.root_pv().to_vec();
            let Some(&best) = pv.first() else {
                break;
            };

            self.flush_nodes();
            self.control.mark_iteration_complete();
            prev_score = score;
            self.root_hint = best;
            let seldepth = self.seldepth.min(u8::MAX as usize) as u8;

            debug!(worker = self.id, depth, score, nodes = self.nodes, best = %best, "iteration complete");

            if self.id == 0 {
                let elapsed = self.started.elapsed();
                let nodes = self.control.total_nodes();
                let millis = elapsed.as_millis().max(1) as u64;
                on_info(&SearchInfo {
                    depth,
                    seldepth,
                    score: Score::from_internal(score),
                    nodes,
                    nps: nodes * 1000 / millis,
                    elapsed,
                    hashfull: self.tt.hashfull(),
                    pv: &pv,
                });
                let scale = stability.update(best, score);
                self.control.update_soft_scale(scale);
            }

            completed = Some(Completed { score, depth, seldepth, pv });
        }

        self.flush_nodes();
        let elapsed = self.started.elapsed();
        match completed {
            Some(c) => SearchResult {
                best_move: c.pv[0],
                ponder_move: c.pv.get(1).copied(),
                score: c.score,
                depth: c.depth,
                seldepth: c.seldepth,
                pv: c.pv,
                nodes: self.nodes,
                stats: self.stats,
                elapsed,
            },
            None => {
                let fallback = self.first_ordered_move(&pos);
                SearchResult {
                    best_move: fallback,
                    ponder_move: None,
                    pv: if fallback.is_null() { Vec::new() } else { vec![fallback] },
                    score: 0,
                    depth: 0,
                    seldepth: 0,
                    nodes: self.nodes,
                    stats: self.stats,
                    elapsed,
                }
            }
        }
    }

    /// Root search inside a window around the previous iteration's score,
    /// widening the side that failed until the score lands inside.
    fn aspiration(&mut self, pos: &mut Position, depth: i32, prev_score: i32) -> i32 {
        let p = self.params;
        if depth < p.aspiration_min_depth || is_mate_score(prev_score) {
            return self.negamax(pos, depth, 0, -INF, INF, true);
        }

        let mut below = p.aspiration_delta;
        let mut above = p.aspiration_delta;
        let mut fails = 0;
        loop {
            let (alpha, beta) = if fails >= p.aspiration_max_fails {
                (-INF, INF)
            } else {
                ((prev_score - below).max(-INF), (prev_score + above).min(INF))
            };
            let score = self.negamax(pos, depth, 0, alpha, beta, true);
            if self.aborted {
                return score;
            }
            if score <= alpha && alpha > -INF {
                fails += 1;
                below *= 2;
                trace!(worker = self.id, depth, alpha, beta, score, "aspiration fail low");
            } else if score >= beta && beta < INF {
                fails += 1;
                above *= 2;
                trace!(worker = self.id, depth, alpha, beta, score, "aspiration fail high");
            } else {
                return score;
            }
        }
    }

    /// The move the picker would try first, or [`Move::NULL`] if there is none.
    fn first_ordered_move(&self, pos: &Position) -> Move {
        let tt_move = self.tt.probe(pos.hash(), 0).map_or(Move::NULL, |e| e.best_move);
        let mut picker = MovePicker::new(pos, tt_move, [Move::NULL; 2], Move::NULL, false);
        picker.next_move(pos, &self.history).unwrap_or(Move::NULL)
    }
}
