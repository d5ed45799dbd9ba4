//! Content-addressed block storage for Tidal repositories.
//!
//! Every structure in a repository (records, SSTables, branch indexes,
//! namespaces, the follow index, roots, and signed commits) is stored as an
//! immutable block identified by its BLAKE3 hash, domain-separated by block
//! kind.
//!
//! # Block Types
//!
//! Typed views over blocks implement [`Node`]:
//!
//! - [`RecordNode`] -- opaque record value (leaf)
//! - [`TableNode`] -- SSTable: entry key → record CID
//! - [`IndexNode`] -- branch index: table name → SSTable CID
//! - [`NamespaceNode`] -- the two collection branches of a namespace
//! - [`RelationshipsNode`] -- follow index: DID → follow record CID
//! - [`RootNode`] -- repository root for one commit
//! - [`CommitNode`] -- signature over a root
//!
//! # Storage Backends
//!
//! All backends implement the [`BlockStore`] trait:
//!
//! - [`InMemoryBlockStore`] -- `HashMap`-based store for tests and embedding
//! - [`OverlayStore`] -- stages writes over a base store until committed
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written (content-addressing guarantees this).
//! 2. Identical logical values produce identical CIDs.
//! 3. Concurrent reads are always safe (blocks are immutable).
//! 4. Reads are typed: a block of the wrong kind is a shape mismatch.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod block;
pub mod error;
pub mod memory;
pub mod node;
pub mod overlay;
pub mod traits;
pub mod walk;

// Re-export primary types at crate root for ergonomic imports.
pub use block::{Block, BlockKind};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlockStore;
pub use node::{
    CommitNode, IndexNode, NamespaceNode, Node, RecordNode, RelationshipsNode, RootNode, TableNode,
};
pub use overlay::OverlayStore;
pub use traits::{BlockStore, BlockStoreExt, SharedStore};
pub use walk::BlockWalker;
