use tidal_types::Cid;

use crate::block::BlockKind;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block was not found.
    #[error("block not found: {0}")]
    NotFound(Cid),

    /// The block exists but is not of the expected kind.
    #[error("shape mismatch for {cid}: expected {expected}, got {actual}")]
    ShapeMismatch {
        cid: Cid,
        expected: BlockKind,
        actual: BlockKind,
    },

    /// The block has the expected kind but its data does not decode.
    #[error("cannot decode {kind} block {cid}: {reason}")]
    Decode {
        cid: Cid,
        kind: BlockKind,
        reason: String,
    },

    /// The content hash of an imported block does not match its claimed CID.
    #[error("hash mismatch for {cid}: computed {computed}")]
    HashMismatch { cid: Cid, computed: Cid },

    /// Serialization failure while encoding a node.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
