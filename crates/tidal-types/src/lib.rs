//! Foundation types for Tidal repositories.
//!
//! This crate provides the identity, ordering, and addressing types used
//! throughout the Tidal system. Every other Tidal crate depends on
//! `tidal-types`.
//!
//! # Key Types
//!
//! - [`Cid`]: Content identifier (BLAKE3 hash) of an immutable block
//! - [`Tid`]: Sortable timestamp identifier used as the key of every entry
//! - [`TidClock`]: Per-writer generator of strictly increasing TIDs
//! - [`Did`]: Decentralized identifier of the account owning a repository
//! - [`Collection`]: The record collections held by a namespace

pub mod cid;
pub mod collection;
pub mod did;
pub mod error;
pub mod tid;

pub use cid::Cid;
pub use collection::Collection;
pub use did::Did;
pub use error::TypeError;
pub use tid::{Tid, TidClock};
