use tidal_crypto::SignatureError;
use tidal_store::StoreError;
use tidal_types::{Did, Tid};

/// Errors produced by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("table is full ({capacity} entries)")]
    TableFull { capacity: usize },

    #[error("duplicate entry key: {0}")]
    DuplicateKey(Tid),

    #[error("entry key not found: {0}")]
    KeyNotFound(Tid),

    #[error("merge conflict on entry key: {0}")]
    MergeConflict(Tid),

    #[error("entry key {key} is older than {floor}")]
    KeyTooOld { key: Tid, floor: Tid },

    #[error("not following {0}")]
    NotFollowing(Did),

    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("cannot revert {requested} commits: only {available} in history")]
    HistoryTooShort { requested: usize, available: usize },

    #[error("repository was loaded without a signing key")]
    ReadOnly,

    #[error("signing key does not belong to {0}")]
    KeyMismatch(Did),

    #[error("write to {0} not authorized")]
    Unauthorized(String),

    #[error("commit signature: {0}")]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RepoResult<T> = Result<T, RepoError>;
