//! Search control: stop flag, clock, node budget and shared node counter.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Nodes between clock checks.
const CLOCK_CHECK_MASK: u64 = 2047;

const HOLD_POLL: Duration = Duration::from_millis(1);

/// Decides when a search must stop.
///
/// Shared by every worker of a search. Modes:
/// - **Infinite**: only the external stop flag (or a node budget) ends it
/// - **Timed**: soft and hard limits, clock running from construction
/// - **Ponder**: limits known but the clock waits for [`activate()`](Self::activate)
///
/// Internal limits never fire before some worker has completed an
/// iteration, so a search always has a move to report. Only the external
/// stop flag can end it earlier.
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    clock_active: AtomicBool,
    start: Mutex<Option<Instant>>,
    soft_limit: Option<Duration>,
    hard_limit: Option<Duration>,
    node_limit: Option<u64>,
    /// Soft limit scale in hundredths, driven by best-move stability.
    soft_scale: AtomicI32,
    nodes: AtomicU64,
    iteration_done: AtomicBool,
    /// Keep the result back until the stop flag is raised.
    hold: bool,
}

impl SearchControl {
    fn build(stopped: Arc<AtomicBool>, start: Option<Instant>, soft: Option<Duration>, hard: Option<Duration>) -> Self {
        Self {
            stopped,
            clock_active: AtomicBool::new(start.is_some()),
            start: Mutex::new(start),
            soft_limit: soft,
            hard_limit: hard,
            node_limit: None,
            soft_scale: AtomicI32::new(100),
            nodes: AtomicU64::new(0),
            iteration_done: AtomicBool::new(false),
            hold: false,
        }
    }

    /// No time limits.
    pub fn new_infinite(stopped: Arc<AtomicBool>) -> Self {
        Self::build(stopped, None, None, None)
    }

    /// Soft and hard time limits; the clock starts now.
    pub fn new_timed(stopped: Arc<AtomicBool>, soft: Duration, hard: Duration) -> Self {
        Self::build(stopped, Some(Instant::now()), Some(soft), Some(hard))
    }

    /// Time limits that only start counting on [`activate()`](Self::activate).
    pub fn new_ponder(stopped: Arc<AtomicBool>, soft: Duration, hard: Duration) -> Self {
        Self::build(stopped, None, Some(soft), Some(hard))
    }

    /// Stop once this many nodes have been searched across all workers.
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = Some(nodes);
        self
    }

    /// Do not return before an external stop, even once the last depth is done.
    pub fn until_stopped(mut self) -> Self {
        self.hold = true;
        self
    }

    /// Block until the stop flag is raised if the search is held open.
    pub fn wait_if_held(&self) {
        while self.hold && !self.is_stopped() {
            thread::sleep(HOLD_POLL);
        }
    }

    /// Start the clock (the opponent played the expected move).
    pub fn activate(&self) {
        *self.start.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        self.clock_active.store(true, Ordering::Release);
    }

    /// Raise the stop flag. Every worker unwinds at its next node.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Whether a worker that has searched `local_nodes` nodes must abort now.
    ///
    /// The flag is read every call; clock and node budget only every 2048
    /// nodes. A fired limit raises the flag for everybody.
    pub fn should_stop(&self, local_nodes: u64) -> bool {
        if self.is_stopped() {
            return true;
        }
        if local_nodes & CLOCK_CHECK_MASK != 0 || !self.iteration_done.load(Ordering::Acquire) {
            return false;
        }
        if self.node_budget_spent() || self.hard_limit_passed() {
            self.stop();
            return true;
        }
        false
    }

    /// Whether iterative deepening should skip starting the next iteration.
    pub fn should_stop_iterating(&self) -> bool {
        if self.is_stopped() || self.node_budget_spent() {
            return true;
        }
        if !self.clock_active.load(Ordering::Acquire) {
            return false;
        }
        match self.soft_limit {
            Some(soft) => {
                let scale = self.soft_scale.load(Ordering::Relaxed).max(1) as u32;
                self.elapsed() >= soft * scale / 100
            }
            None => false,
        }
    }

    fn node_budget_spent(&self) -> bool {
        self.node_limit.is_some_and(|limit| self.total_nodes() >= limit)
    }

    fn hard_limit_passed(&self) -> bool {
        self.clock_active.load(Ordering::Acquire)
            && self.hard_limit.is_some_and(|hard| self.elapsed() >= hard)
    }

    /// Scale the soft limit, in hundredths (100 = unchanged).
    pub fn update_soft_scale(&self, scale: i32) {
        self.soft_scale.store(scale, Ordering::Relaxed);
    }

    /// Record that some worker finished an iteration.
    pub fn mark_iteration_complete(&self) {
        self.iteration_done.store(true, Ordering::Release);
    }

    /// Add a worker's batch of nodes to the shared total.
    #[inline]
    pub fn add_nodes(&self, nodes: u64) {
        self.nodes.fetch_add(nodes, Ordering::Relaxed);
    }

    /// Nodes reported by all workers so far.
    pub fn total_nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    /// Time since the clock started, or zero if it has not.
    pub fn elapsed(&self) -> Duration {
        self.start
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map_or(Duration::ZERO, |s| s.elapsed())
    }
}

impl std::fmt::Debug for SearchControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchControl")
            .field("stopped", &self.is_stopped())
            .field("soft_limit", &self.soft_limit)
            .field("hard_limit", &self.hard_limit)
            .field("node_limit", &self.node_limit)
            .field("hold", &self.hold)
            .field("nodes", &self.total_nodes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn infinite_only_stops_on_flag() {
        let stopped = flag();
        let control = SearchControl::new_infinite(stopped.clone());
        control.mark_iteration_complete();
        assert!(!control.should_stop(0));
        assert!(!control.should_stop_iterating());
        stopped.store(true, Ordering::Relaxed);
        assert!(control.should_stop(1));
        assert!(control.should_stop_iterating());
    }

    #[test]
    fn hard_limit_waits_for_first_iteration() {
        let control = SearchControl::new_timed(flag(), Duration::ZERO, Duration::ZERO);
        assert!(!control.should_stop(0));
        control.mark_iteration_complete();
        assert!(control.should_stop(0));
        assert!(control.is_stopped());
    }

    #[test]
    fn clock_checked_only_on_node_boundaries() {
        let control = SearchControl::new_timed(flag(), Duration::ZERO, Duration::ZERO);
        control.mark_iteration_complete();
        assert!(!control.should_stop(1));
        assert!(control.should_stop(2048));
    }

    #[test]
    fn ponder_clock_starts_on_activate() {
        let control = SearchControl::new_ponder(flag(), Duration::ZERO, Duration::ZERO);
        control.mark_iteration_complete();
        assert!(!control.should_stop_iterating());
        assert!(!control.should_stop(0));
        assert_eq!(control.elapsed(), Duration::ZERO);
        control.activate();
        assert!(control.should_stop_iterating());
    }

    #[test]
    fn node_budget_counts_all_workers() {
        let control = SearchControl::new_infinite(flag()).with_node_limit(5000);
        control.mark_iteration_complete();
        control.add_nodes(3000);
        assert!(!control.should_stop(0));
        control.add_nodes(3000);
        assert!(control.should_stop_iterating());
        assert!(control.should_stop(0));
    }

    #[test]
    fn held_control_waits_for_the_flag() {
        let stopped = flag();
        let control = SearchControl::new_infinite(stopped.clone()).until_stopped();
        let started = std::time::Instant::now();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(30));
                stopped.store(true, Ordering::Release);
            });
            control.wait_if_held();
        });
        assert!(started.elapsed() >= Duration::from_millis(30));

        // Without a hold there is nothing to wait for.
        SearchControl::new_infinite(flag()).wait_if_held();
    }

    #[test]
    fn soft_scale_extends_the_soft_limit() {
        let control = SearchControl::new_timed(flag(), Duration::from_millis(40), Duration::from_secs(5));
        control.update_soft_scale(10_000);
        std::thread::sleep(Duration::from_millis(60));
        assert!(!control.should_stop_iterating());
        control.update_soft_scale(100);
        assert!(control.should_stop_iterating());
    }
}
