use thiserror::Error;
use tidal_types::{Cid, Did};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("verification failed: {0}")]
    Verification(String),

    #[error("commit chain from {head} does not reach the local head")]
    ChainBroken { head: Cid },

    #[error("commit {commit} belongs to {actual}, expected {expected}")]
    DidMismatch {
        commit: Cid,
        expected: Did,
        actual: Did,
    },

    #[error("diff exceeds {limit} blocks")]
    TooManyBlocks { limit: usize },

    #[error("diff computation cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Repo(#[from] tidal_repo::RepoError),

    #[error(transparent)]
    Store(#[from] tidal_store::StoreError),

    #[error("pack error: {0}")]
    Pack(#[from] tidal_pack::PackError),
}

pub type SyncResult<T> = Result<T, SyncError>;
