//! Error types for position setup and move parsing.

/// Errors that can occur when parsing a FEN string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("expected at least 4 space-separated fields, found {found}")]
    MissingFields { found: usize },

    #[error("invalid {field} field: \"{found}\"")]
    InvalidCounter { field: &'static str, found: String },

    #[error("invalid piece placement \"{placement}\": {reason}")]
    InvalidPlacement { placement: String, reason: &'static str },

    #[error("board rejected position \"{fen}\"")]
    Rejected { fen: String },
}

/// Errors that can occur when turning UCI move text into a [`crate::Move`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("malformed move text: \"{0}\"")]
    Malformed(String),

    #[error("move {0} is not legal in this position")]
    Illegal(String),
}
