//! Delta synchronization between replicas of a Tidal repository.
//!
//! A replica that lags behind asks for the blocks reachable from the newer
//! head and not from its own ([`compute_diff`]), receives them as an archive,
//! and replays them with [`load_and_verify_diff`]: the commit chain is
//! verified end to end, the structural changes of each commit become typed
//! [`Event`]s, and only then are the blocks persisted and the events emitted.

pub mod config;
pub mod delta;
pub mod diff;
pub mod error;
pub mod event;
pub mod projection;
pub mod replay;
pub mod replica;
pub mod transfer;
pub mod transport;
pub mod verifier;

pub use config::SyncConfig;
pub use delta::{branch_delta, diff_maps, Change};
pub use diff::{compute_checkout, compute_diff, BlockSet};
pub use error::{SyncError, SyncResult};
pub use event::Event;
pub use projection::RecordProjection;
pub use replay::{commit_events, load_and_verify_diff};
pub use replica::Replica;
pub use transfer::{
    export_checkout, export_diff, export_full, load_archive, read_archive, save_archive, write_archive,
};
pub use transport::{LocalSource, RepoSource};
pub use verifier::{CommitVerifier, SignatureVerifier, StructuralVerifier};
