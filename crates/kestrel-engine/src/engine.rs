//! The engine facade: configuration, the shared hash table and the stop
//! signal behind one handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use kestrel_core::Position;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::limits::SearchLimits;
use crate::search::control::SearchControl;
use crate::search::pool::parallel_search;
use crate::search::tt::TranspositionTable;
use crate::search::{SearchInfo, SearchResult};

/// Cloneable handle that stops a running search from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A search engine instance.
///
/// `search` takes `&self`, so one thread can search while another calls
/// [`stop`](Self::stop) or [`ponderhit`](Self::ponderhit) on a shared reference.
pub struct Engine {
    config: EngineConfig,
    tt: TranspositionTable,
    stopped: Arc<AtomicBool>,
    running: Mutex<Option<Arc<SearchControl>>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        info!(hash_mb = config.hash_mb, threads = config.threads, "engine created");
        Ok(Self {
            tt: TranspositionTable::new(config.hash_mb),
            config,
            stopped: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Search `pos` within `limits`, calling `on_info` after every completed
    /// depth.
    ///
    /// Fails only when the root has no legal move. Otherwise the result
    /// always carries a legal move, even when stopped before depth 1
    /// completed.
    pub fn search<F>(&self, pos: &Position, limits: &SearchLimits, on_info: F) -> Result<SearchResult, EngineError>
    where
        F: FnMut(&SearchInfo<'_>),
    {
        if pos.legal_moves().is_empty() {
            let in_check = pos.is_in_check();
            warn!(fen = %pos.fen(), in_check, "search requested on a terminal position");
            return Err(EngineError::NoLegalMoves { in_check });
        }

        let control = Arc::new(limits.to_control(pos, Arc::clone(&self.stopped)));
        self.set_running(Some(Arc::clone(&control)));
        self.tt.new_generation();

        let max_depth = limits.max_depth(self.config.max_depth);
        debug!(fen = %pos.fen(), max_depth, ?control, "search started");
        let result = parallel_search(
            &self.tt,
            pos,
            max_depth,
            &control,
            &self.config.params,
            self.config.threads,
            on_info,
        );
        self.set_running(None);
        self.stopped.store(false, Ordering::Release);
        debug!(
            best = %result.best_move,
            depth = result.depth,
            score = result.score,
            nodes = result.nodes,
            "search finished"
        );
        Ok(result)
    }

    /// Stop the running search; it returns its last completed depth.
    ///
    /// A stop that arrives before the search begins is kept and ends that
    /// search as soon as it starts. The flag is cleared when a search returns.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stopped))
    }

    /// The opponent played the expected move: start the ponder search's clock.
    pub fn ponderhit(&self) {
        if let Some(control) = self.running.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            control.activate();
        }
    }

    /// Forget everything learned from the previous game.
    pub fn new_game(&self) {
        self.tt.clear();
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<(), EngineError> {
        let config = EngineConfig { threads, ..self.config.clone() };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Reallocate the hash table. Its contents are lost.
    pub fn resize_hash(&mut self, mb: usize) -> Result<(), EngineError> {
        let config = EngineConfig { hash_mb: mb, ..self.config.clone() };
        config.validate()?;
        self.tt = TranspositionTable::new(mb);
        self.config = config;
        Ok(())
    }

    /// Hash table occupancy in permille.
    pub fn hashfull(&self) -> u16 {
        self.tt.hashfull()
    }

    fn set_running(&self, control: Option<Arc<SearchControl>>) {
        *self.running.lock().unwrap_or_else(|e| e.into_inner()) = control;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("tt", &self.tt)
            .finish()
    }
}
