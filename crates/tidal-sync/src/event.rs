//! Typed changes replayed from a verified diff.

use std::fmt;

use serde::{Deserialize, Serialize};
use tidal_types::{Cid, Collection, Did, Tid};

/// One structural change between two consecutive commits.
///
/// Events are produced in the order the underlying writes happened and are
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AddedObject {
        namespace: String,
        collection: Collection,
        tid: Tid,
        cid: Cid,
    },
    UpdatedObject {
        namespace: String,
        collection: Collection,
        tid: Tid,
        cid: Cid,
        prev: Cid,
    },
    DeletedObject {
        namespace: String,
        collection: Collection,
        tid: Tid,
    },
    AddedRelationship {
        did: Did,
        cid: Cid,
    },
    UpdatedRelationship {
        did: Did,
        cid: Cid,
        prev: Cid,
    },
    DeletedRelationship {
        did: Did,
    },
    DeletedNamespace {
        namespace: String,
    },
}

impl Event {
    /// Short snake_case name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddedObject { .. } => "added_object",
            Self::UpdatedObject { .. } => "updated_object",
            Self::DeletedObject { .. } => "deleted_object",
            Self::AddedRelationship { .. } => "added_relationship",
            Self::UpdatedRelationship { .. } => "updated_relationship",
            Self::DeletedRelationship { .. } => "deleted_relationship",
            Self::DeletedNamespace { .. } => "deleted_namespace",
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            Self::AddedRelationship { .. }
                | Self::UpdatedRelationship { .. }
                | Self::DeletedRelationship { .. }
        )
    }

    /// The namespace touched, for object and namespace events.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::AddedObject { namespace, .. }
            | Self::UpdatedObject { namespace, .. }
            | Self::DeletedObject { namespace, .. }
            | Self::DeletedNamespace { namespace } => Some(namespace),
            _ => None,
        }
    }

    /// The CID the change points at, if it introduces one.
    pub fn cid(&self) -> Option<Cid> {
        match self {
            Self::AddedObject { cid, .. }
            | Self::UpdatedObject { cid, .. }
            | Self::AddedRelationship { cid, .. }
            | Self::UpdatedRelationship { cid, .. } => Some(*cid),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddedObject {
                namespace,
                collection,
                tid,
                cid,
            } => write!(f, "+ {namespace}/{collection}/{tid} {}", cid.short_hex()),
            Self::UpdatedObject {
                namespace,
                collection,
                tid,
                cid,
                prev,
            } => write!(
                f,
                "~ {namespace}/{collection}/{tid} {} -> {}",
                prev.short_hex(),
                cid.short_hex()
            ),
            Self::DeletedObject {
                namespace,
                collection,
                tid,
            } => write!(f, "- {namespace}/{collection}/{tid}"),
            Self::AddedRelationship { did, cid } => write!(f, "+ follow {did} {}", cid.short_hex()),
            Self::UpdatedRelationship { did, cid, prev } => write!(
                f,
                "~ follow {did} {} -> {}",
                prev.short_hex(),
                cid.short_hex()
            ),
            Self::DeletedRelationship { did } => write!(f, "- follow {did}"),
            Self::DeletedNamespace { namespace } => write!(f, "- namespace {namespace}"),
        }
    }
}
