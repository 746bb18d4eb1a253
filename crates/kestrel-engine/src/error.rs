//! Engine errors.

use thiserror::Error;

/// Failures surfaced by [`Engine`](crate::Engine) before any search runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The root has no legal move: checkmate when `in_check`, else stalemate.
    #[error("no legal moves in root position ({})", if *in_check { "checkmate" } else { "stalemate" })]
    NoLegalMoves { in_check: bool },
}
