use tidal_crypto::VerifyingKey;
use tidal_store::CommitNode;
use tidal_types::Did;

use crate::error::{SyncError, SyncResult};

/// Decides whether a received commit was authored by the repository owner.
///
/// Chain continuity and DID continuity are checked by the caller; an
/// implementation only judges the commit envelope itself.
pub trait CommitVerifier: Send + Sync {
    fn verify_commit(&self, did: &Did, commit: &CommitNode) -> SyncResult<()>;
}

/// Checks the commit signature against the key embedded in a `did:key` DID.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureVerifier;

impl CommitVerifier for SignatureVerifier {
    fn verify_commit(&self, did: &Did, commit: &CommitNode) -> SyncResult<()> {
        let key = VerifyingKey::from_did(did)
            .map_err(|e| SyncError::Verification(format!("{did}: {e}")))?;
        key.verify(commit.root.as_bytes(), &commit.sig)
            .map_err(|e| SyncError::Verification(format!("root {}: {e}", commit.root.short_hex())))
    }
}

/// Accepts any signature. Used when signature checks are switched off.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralVerifier;

impl CommitVerifier for StructuralVerifier {
    fn verify_commit(&self, _did: &Did, _commit: &CommitNode) -> SyncResult<()> {
        Ok(())
    }
}
