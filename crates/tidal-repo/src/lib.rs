//! Repository structure for Tidal.
//!
//! Entries (posts, interactions) are keyed by [`tidal_types::Tid`] and indexed
//! in size-tiered SSTables. This crate provides:
//! - [`SsTable`] with its four size tiers ([`TableSize`])
//! - [`Branch`], the per-collection table index and its 4-way compaction cascade
//! - [`Namespace`] and [`Relationships`], the structures under a repository root
//! - [`Repo`], the single writer publishing signed commits
//! - [`WriteOp`], a write staged for a multi-write commit
//! - [`WriteAuthority`], the capability check consulted before writes

pub mod auth;
pub mod branch;
pub mod error;
pub mod namespace;
pub mod relationships;
pub mod repo;
pub mod sstable;
pub mod write;

pub use auth::{AllowAll, NamespaceGrant, WriteAuthority, WriteScope};
pub use branch::Branch;
pub use error::{RepoError, RepoResult};
pub use namespace::Namespace;
pub use relationships::{Follow, Relationships};
pub use repo::Repo;
pub use sstable::{SsTable, TableSize};
pub use write::WriteOp;
