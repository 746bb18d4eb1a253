//! Game-tree search for kestrel.
//!
//! A principal variation search with a shared lockless transposition table,
//! run by one or more Lazy SMP workers under time, depth and node limits.

pub mod config;
pub mod engine;
pub mod error;
pub mod limits;
pub mod search;

pub use config::EngineConfig;
pub use engine::{Engine, StopHandle};
pub use error::EngineError;
pub use limits::{SearchLimits, TimeBudget, compute_limits};
pub use search::control::SearchControl;
pub use search::params::SearchParams;
pub use search::pool::parallel_search;
pub use search::score::Score;
pub use search::tt::TranspositionTable;
pub use search::{SearchInfo, SearchResult, SearchStats};
