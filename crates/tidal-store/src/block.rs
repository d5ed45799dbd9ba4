use serde::{Deserialize, Serialize};
use tidal_crypto::ContentHasher;
use tidal_types::Cid;

use crate::error::StoreResult;
use crate::node::{
    CommitNode, IndexNode, NamespaceNode, Node, RelationshipsNode, RootNode, TableNode,
};

/// The kind of block stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockKind {
    /// Opaque record value (post, interaction, follow).
    Record,
    /// SSTable: entry key → record CID.
    Table,
    /// Branch index: table name → SSTable CID.
    Index,
    /// Namespace: one branch per collection.
    Namespace,
    /// Follow index: DID → follow record CID.
    Relationships,
    /// Repository root for one commit.
    Root,
    /// Signed commit pointing at a root.
    Commit,
}

impl BlockKind {
    /// Every block kind, in type-byte order.
    pub const ALL: [BlockKind; 7] = [
        Self::Record,
        Self::Table,
        Self::Index,
        Self::Namespace,
        Self::Relationships,
        Self::Root,
        Self::Commit,
    ];

    /// Domain-separated hasher for blocks of this kind.
    pub fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Record => &ContentHasher::RECORD,
            Self::Table => &ContentHasher::TABLE,
            Self::Index => &ContentHasher::INDEX,
            Self::Namespace | Self::Relationships | Self::Root => &ContentHasher::NODE,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }

    /// Type byte used by the archive format.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Record => 1,
            Self::Table => 2,
            Self::Index => 3,
            Self::Namespace => 4,
            Self::Relationships => 5,
            Self::Root => 6,
            Self::Commit => 7,
        }
    }

    /// Parse from a type byte.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_byte() == byte)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record => write!(f, "record"),
            Self::Table => write!(f, "table"),
            Self::Index => write!(f, "index"),
            Self::Namespace => write!(f, "namespace"),
            Self::Relationships => write!(f, "relationships"),
            Self::Root => write!(f, "root"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A stored block: kind tag + serialized data + cached size.
///
/// `Block` is the unit of storage and transfer. Stores never interpret the
/// data; typed access goes through [`Node`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The type of this block.
    pub kind: BlockKind,
    /// The serialized bytes of the block.
    pub data: Vec<u8>,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl Block {
    /// Create a new block from kind and data.
    pub fn new(kind: BlockKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Compute the content identifier for this block.
    pub fn compute_cid(&self) -> Cid {
        self.kind.hasher().hash(&self.data)
    }

    /// CIDs this block points at, in a deterministic order.
    ///
    /// Records are leaves. Structural blocks are decoded to find their links,
    /// so a block that fails to decode is reported as a decode error.
    pub fn links(&self, cid: &Cid) -> StoreResult<Vec<Cid>> {
        Ok(match self.kind {
            BlockKind::Record => Vec::new(),
            BlockKind::Table => TableNode::from_block(cid, self)?.links(),
            BlockKind::Index => IndexNode::from_block(cid, self)?.links(),
            BlockKind::Namespace => NamespaceNode::from_block(cid, self)?.links(),
            BlockKind::Relationships => RelationshipsNode::from_block(cid, self)?.links(),
            BlockKind::Root => RootNode::from_block(cid, self)?.links(),
            BlockKind::Commit => CommitNode::from_block(cid, self)?.links(),
        })
    }
}
