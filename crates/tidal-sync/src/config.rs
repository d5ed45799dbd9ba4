use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::verifier::{CommitVerifier, SignatureVerifier, StructuralVerifier};

/// Limits and checks applied when computing and applying diffs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on the number of blocks in one diff.
    pub max_blocks: usize,
    /// When `false`, commits are only checked for chain and DID continuity.
    pub verify_signatures: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_blocks: 100_000,
            verify_signatures: true,
        }
    }
}

impl SyncConfig {
    /// The commit verifier this configuration asks for.
    pub fn verifier(&self) -> Arc<dyn CommitVerifier> {
        if self.verify_signatures {
            Arc::new(SignatureVerifier)
        } else {
            Arc::new(StructuralVerifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_verify_signatures() {
        let config = SyncConfig::default();
        assert!(config.verify_signatures);
        assert_eq!(config.max_blocks, 100_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SyncConfig = toml::from_str("max_blocks = 10").unwrap();
        assert_eq!(config.max_blocks, 10);
        assert!(config.verify_signatures);
    }

    #[test]
    fn empty_toml_is_default() {
        let config: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
    }
}
