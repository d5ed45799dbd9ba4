//! Typed views over blocks.
//!
//! A [`Node`] is the "expected shape" of a block: reading a CID as a node
//! checks the block kind first ([`StoreError::ShapeMismatch`]) and then
//! decodes the data ([`StoreError::Decode`]). Nodes serialize to JSON over
//! ordered maps, so the same logical value always hashes to the same CID.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tidal_crypto::Signature;
use tidal_types::{Cid, Did, Tid};

use crate::block::{Block, BlockKind};
use crate::error::{StoreError, StoreResult};

/// A block shape that can be persisted and read back by CID.
pub trait Node: Serialize + DeserializeOwned {
    /// The block kind this shape is stored as.
    const KIND: BlockKind;

    /// CIDs referenced by this node, in a deterministic order.
    fn links(&self) -> Vec<Cid>;

    /// Serialize into a block.
    fn to_block(&self) -> StoreResult<Block> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Block::new(Self::KIND, data))
    }

    /// Decode from a block, checking its kind first.
    fn from_block(cid: &Cid, block: &Block) -> StoreResult<Self> {
        if block.kind != Self::KIND {
            return Err(StoreError::ShapeMismatch {
                cid: *cid,
                expected: Self::KIND,
                actual: block.kind,
            });
        }
        serde_json::from_slice(&block.data).map_err(|e| StoreError::Decode {
            cid: *cid,
            kind: Self::KIND,
            reason: e.to_string(),
        })
    }
}

/// Opaque record value. Records are leaves of the block graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordNode(pub serde_json::Value);

impl Node for RecordNode {
    const KIND: BlockKind = BlockKind::Record;

    fn links(&self) -> Vec<Cid> {
        Vec::new()
    }
}

/// Persisted SSTable: string-encoded entry key → record CID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableNode {
    pub entries: BTreeMap<Tid, Cid>,
}

impl Node for TableNode {
    const KIND: BlockKind = BlockKind::Table;

    fn links(&self) -> Vec<Cid> {
        self.entries.values().copied().collect()
    }
}

/// Persisted branch index: string-encoded table name → SSTable CID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexNode {
    pub tables: BTreeMap<Tid, Cid>,
}

impl Node for IndexNode {
    const KIND: BlockKind = BlockKind::Index;

    fn links(&self) -> Vec<Cid> {
        self.tables.values().copied().collect()
    }
}

/// A namespace: one branch index per collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceNode {
    pub posts: Cid,
    pub interactions: Cid,
}

impl Node for NamespaceNode {
    const KIND: BlockKind = BlockKind::Namespace;

    fn links(&self) -> Vec<Cid> {
        vec![self.posts, self.interactions]
    }
}

/// The follow index: followed DID → follow record CID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipsNode {
    pub follows: BTreeMap<Did, Cid>,
}

impl Node for RelationshipsNode {
    const KIND: BlockKind = BlockKind::Relationships;

    fn links(&self) -> Vec<Cid> {
        self.follows.values().copied().collect()
    }
}

/// Repository root for one commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootNode {
    /// The account owning the repository.
    pub did: Did,
    /// The previous commit, `None` for the genesis commit.
    pub prev: Option<Cid>,
    /// Namespace id → namespace CID.
    pub namespaces: BTreeMap<String, Cid>,
    /// The follow index.
    pub relationships: Cid,
}

impl Node for RootNode {
    const KIND: BlockKind = BlockKind::Root;

    /// Structure first, history last: a walk from a new commit reaches the
    /// new structure before descending into older commits.
    fn links(&self) -> Vec<Cid> {
        let mut links: Vec<Cid> = self.namespaces.values().copied().collect();
        links.push(self.relationships);
        links.extend(self.prev);
        links
    }
}

/// Signature by the account key over the root CID bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNode {
    pub root: Cid,
    pub sig: Signature,
}

impl Node for CommitNode {
    const KIND: BlockKind = BlockKind::Commit;

    fn links(&self) -> Vec<Cid> {
        vec![self.root]
    }
}
