//! Search limits and clock budgeting.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use kestrel_core::eval::MAX_PHASE;
use kestrel_core::{Color, Position};

use crate::search::control::SearchControl;
use crate::search::score::MAX_DEPTH;

/// Reserved per move for communication and scheduling latency.
const MOVE_OVERHEAD: Duration = Duration::from_millis(10);

/// Below this much time left, the engine moves almost instantly.
const PANIC_TIME: Duration = Duration::from_millis(10);

/// What bounds a search. Any combination may be set. `movetime` overrides
/// the clock fields and `infinite`. Without `movetime`, `infinite` also
/// overrides `depth` and `nodes`: the search runs until stopped. Otherwise
/// `depth`/`nodes` apply on top of whatever time mode results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: Option<u8>,
    pub nodes: Option<u64>,
    pub movetime: Option<Duration>,
    pub wtime: Option<Duration>,
    pub btime: Option<Duration>,
    pub winc: Option<Duration>,
    pub binc: Option<Duration>,
    pub movestogo: Option<u32>,
    pub infinite: bool,
    /// Search on the opponent's time; the clock starts on `ponderhit`.
    pub ponder: bool,
}

impl SearchLimits {
    pub fn depth(depth: u8) -> Self {
        Self { depth: Some(depth), ..Self::default() }
    }

    pub fn nodes(nodes: u64) -> Self {
        Self { nodes: Some(nodes), ..Self::default() }
    }

    pub fn movetime(movetime: Duration) -> Self {
        Self { movetime: Some(movetime), ..Self::default() }
    }

    pub fn infinite() -> Self {
        Self { infinite: true, ..Self::default() }
    }

    /// Only an external stop ends the search.
    pub fn runs_until_stopped(&self) -> bool {
        self.infinite && self.movetime.is_none()
    }

    /// Deepest iteration allowed, capped by `ceiling`.
    pub fn max_depth(&self, ceiling: u8) -> u8 {
        let depth = if self.runs_until_stopped() { None } else { self.depth };
        depth.unwrap_or(MAX_DEPTH).min(ceiling).clamp(1, MAX_DEPTH)
    }

    /// Build the control for a search from `pos`, sharing `stopped`.
    pub fn to_control(&self, pos: &Position, stopped: Arc<AtomicBool>) -> SearchControl {
        let control = match self.time_budget(pos.side_to_move(), pos.phase()) {
            Some(budget) if self.ponder => SearchControl::new_ponder(stopped, budget.soft, budget.hard),
            Some(budget) => SearchControl::new_timed(stopped, budget.soft, budget.hard),
            None => SearchControl::new_infinite(stopped),
        };
        if self.runs_until_stopped() {
            return control.until_stopped();
        }
        match self.nodes {
            Some(nodes) => control.with_node_limit(nodes),
            None => control,
        }
    }

    /// Soft and hard limits for the side to move, `None` when time is unbounded.
    pub fn time_budget(&self, side: Color, phase: i32) -> Option<TimeBudget> {
        if let Some(movetime) = self.movetime {
            return Some(TimeBudget { soft: movetime, hard: movetime });
        }
        if self.infinite {
            return None;
        }
        let (remaining, increment) = match side {
            Color::White => (self.wtime, self.winc),
            Color::Black => (self.btime, self.binc),
        };
        remaining.map(|remaining| {
            compute_limits(remaining, increment.unwrap_or(Duration::ZERO), self.movestogo, phase)
        })
    }
}

/// Soft limit: do not start another iteration after it. Hard limit: abort
/// the running iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    pub soft: Duration,
    pub hard: Duration,
}

/// Clock policy for one kind of time control.
struct Policy {
    /// Expected moves left in an endgame.
    moves_base: u32,
    /// Extra expected moves at full opening material.
    moves_by_phase: u32,
    /// Hard limit as a fraction of usable time, in percent.
    hard_percent: u32,
    /// Hard limit as a multiple of the soft limit, in tenths.
    hard_over_soft: u32,
}

const SUDDEN_DEATH: Policy = Policy {
    moves_base: 18,
    moves_by_phase: 22,
    hard_percent: 12,
    hard_over_soft: 25,
};

const WITH_INCREMENT: Policy = Policy {
    moves_base: 15,
    moves_by_phase: 20,
    hard_percent: 25,
    hard_over_soft: 30,
};

/// Split `remaining` clock time into a per-move budget.
///
/// Without `moves_to_go`, the number of moves still to play is estimated
/// from the game phase (more in the opening, fewer in the endgame). Three
/// quarters of the increment are added to the soft limit.
pub fn compute_limits(remaining: Duration, increment: Duration, moves_to_go: Option<u32>, phase: i32) -> TimeBudget {
    let floor = Duration::from_millis(1);
    if remaining < PANIC_TIME {
        return TimeBudget { soft: floor, hard: floor };
    }

    let usable = remaining.saturating_sub(MOVE_OVERHEAD).max(floor);
    let policy = if increment.is_zero() { &SUDDEN_DEATH } else { &WITH_INCREMENT };
    let phase = phase.clamp(0, MAX_PHASE) as u32;
    let moves_left = moves_to_go
        .map(|m| m.max(1))
        .unwrap_or(policy.moves_base + policy.moves_by_phase * phase / MAX_PHASE as u32);

    let soft = usable / moves_left + increment * 3 / 4;
    let hard = (usable * policy.hard_percent / 100).min(soft * policy.hard_over_soft / 10);

    TimeBudget {
        soft: soft.clamp(floor, usable),
        hard: hard.clamp(floor, usable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn increment_adds_to_soft_limit() {
        let budget = compute_limits(secs(300), secs(2), None, 12);
        // 25 moves left: 299.99s / 25 + 1.5s
        assert!(budget.soft > Duration::from_millis(13_000));
        assert!(budget.soft < Duration::from_millis(14_000));
        assert!(budget.hard > budget.soft);
        assert!(budget.hard <= budget.soft * 3);
    }

    #[test]
    fn sudden_death_hard_cap_is_tight() {
        let budget = compute_limits(secs(60), Duration::ZERO, None, 12);
        assert!(budget.hard <= Duration::from_millis(7_200));
        assert!(budget.hard >= budget.soft);
    }

    #[test]
    fn nearly_flagged_moves_instantly() {
        for remaining in [Duration::ZERO, Duration::from_millis(5)] {
            let budget = compute_limits(remaining, Duration::ZERO, None, 12);
            assert_eq!(budget.soft, Duration::from_millis(1));
            assert_eq!(budget.hard, Duration::from_millis(1));
        }
    }

    #[test]
    fn moves_to_go_overrides_phase() {
        let opening = compute_limits(secs(60), Duration::ZERO, Some(10), MAX_PHASE);
        let endgame = compute_limits(secs(60), Duration::ZERO, Some(10), 0);
        assert_eq!(opening, endgame);
        assert!(opening.soft > Duration::from_millis(5_900));
    }

    #[test]
    fn endgame_spends_more_than_opening() {
        let opening = compute_limits(secs(300), Duration::ZERO, None, MAX_PHASE);
        let endgame = compute_limits(secs(300), Duration::ZERO, None, 0);
        assert!(endgame.soft > opening.soft);
    }

    #[test]
    fn movetime_wins_over_infinite_and_clock() {
        let limits = SearchLimits {
            movetime: Some(Duration::from_millis(500)),
            infinite: true,
            wtime: Some(secs(100)),
            ..SearchLimits::default()
        };
        let budget = limits.time_budget(Color::White, 24).unwrap();
        assert_eq!(budget.soft, Duration::from_millis(500));
        assert_eq!(budget.hard, Duration::from_millis(500));
    }

    #[test]
    fn clock_of_side_to_move_is_used() {
        let limits = SearchLimits {
            wtime: Some(secs(100)),
            btime: Some(Duration::from_millis(5)),
            ..SearchLimits::default()
        };
        assert!(limits.time_budget(Color::White, 12).unwrap().soft > Duration::from_millis(1));
        assert_eq!(limits.time_budget(Color::Black, 12).unwrap().soft, Duration::from_millis(1));
    }

    #[test]
    fn depth_only_and_infinite_are_untimed() {
        assert_eq!(SearchLimits::depth(5).time_budget(Color::White, 24), None);
        assert_eq!(SearchLimits::infinite().time_budget(Color::Black, 24), None);
    }

    #[test]
    fn max_depth_respects_ceiling() {
        assert_eq!(SearchLimits::depth(12).max_depth(8), 8);
        assert_eq!(SearchLimits::default().max_depth(100), MAX_DEPTH);
        assert_eq!(SearchLimits::depth(0).max_depth(10), 1);
    }

    #[test]
    fn infinite_ignores_depth_and_nodes() {
        let limits = SearchLimits {
            depth: Some(2),
            nodes: Some(500),
            ..SearchLimits::infinite()
        };
        assert!(limits.runs_until_stopped());
        assert_eq!(limits.max_depth(MAX_DEPTH), MAX_DEPTH);

        let control = limits.to_control(&Position::startpos(), Arc::new(AtomicBool::new(false)));
        control.mark_iteration_complete();
        control.add_nodes(10_000);
        assert!(!control.should_stop(4096));
        assert!(!control.should_stop_iterating());
    }

    #[test]
    fn movetime_keeps_depth_under_infinite() {
        let limits = SearchLimits {
            depth: Some(3),
            movetime: Some(Duration::from_millis(200)),
            ..SearchLimits::infinite()
        };
        assert!(!limits.runs_until_stopped());
        assert_eq!(limits.max_depth(MAX_DEPTH), 3);
    }

    #[test]
    fn untimed_control_does_not_stop_itself() {
        let control = SearchLimits::depth(4).to_control(&Position::startpos(), Arc::new(AtomicBool::new(false)));
        assert!(!control.should_stop(4096));
        assert!(!control.should_stop_iterating());
    }
}
