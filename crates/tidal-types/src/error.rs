use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid tid {input:?}: {reason}")]
    InvalidTid { input: String, reason: String },

    #[error("invalid did {input:?}: {reason}")]
    InvalidDid { input: String, reason: String },

    #[error("unknown collection: {0}")]
    UnknownCollection(String),
}
