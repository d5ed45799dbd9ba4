use tidal_types::{Cid, Collection, Did, Tid};

use crate::auth::WriteScope;

/// One repository write, as staged by [`crate::Repo::stage`] and applied
/// together by [`crate::Repo::commit_staged`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Index `cid` under `tid`, creating the namespace on first use.
    Add {
        namespace: String,
        collection: Collection,
        tid: Tid,
        cid: Cid,
    },
    /// Point an existing entry at a new CID.
    Edit {
        namespace: String,
        collection: Collection,
        tid: Tid,
        cid: Cid,
    },
    Delete {
        namespace: String,
        collection: Collection,
        tid: Tid,
    },
    DeleteNamespace(String),
    Follow { did: Did, username: String },
    Unfollow(Did),
}

impl WriteOp {
    pub fn add(namespace: impl Into<String>, collection: Collection, tid: Tid, cid: Cid) -> Self {
        Self::Add {
            namespace: namespace.into(),
            collection,
            tid,
            cid,
        }
    }

    pub fn edit(namespace: impl Into<String>, collection: Collection, tid: Tid, cid: Cid) -> Self {
        Self::Edit {
            namespace: namespace.into(),
            collection,
            tid,
            cid,
        }
    }

    pub fn delete(namespace: impl Into<String>, collection: Collection, tid: Tid) -> Self {
        Self::Delete {
            namespace: namespace.into(),
            collection,
            tid,
        }
    }

    pub fn follow(did: Did, username: impl Into<String>) -> Self {
        Self::Follow {
            did,
            username: username.into(),
        }
    }

    /// What this write touches, for the authority check.
    pub fn scope(&self) -> WriteScope<'_> {
        match self {
            Self::Add {
                namespace,
                collection,
                ..
            }
            | Self::Edit {
                namespace,
                collection,
                ..
            }
            | Self::Delete {
                namespace,
                collection,
                ..
            } => WriteScope::Entry {
                namespace,
                collection: *collection,
            },
            Self::DeleteNamespace(namespace) => WriteScope::Namespace(namespace),
            Self::Follow { .. } | Self::Unfollow(_) => WriteScope::Relationships,
        }
    }
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add { tid, .. } => write!(f, "add {} {tid}", self.scope()),
            Self::Edit { tid, .. } => write!(f, "edit {} {tid}", self.scope()),
            Self::Delete { tid, .. } => write!(f, "delete {} {tid}", self.scope()),
            Self::DeleteNamespace(namespace) => write!(f, "drop namespace {namespace}"),
            Self::Follow { did, .. } => write!(f, "follow {did}"),
            Self::Unfollow(did) => write!(f, "unfollow {did}"),
        }
    }
}
