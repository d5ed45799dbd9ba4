use tidal_types::Cid;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"tidal-table-v1"`) that is
/// prepended to every hash computation. A record and a table with identical
/// bytes therefore never share a CID.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for opaque record blocks.
    pub const RECORD: Self = Self {
        domain: "tidal-record-v1",
    };
    /// Hasher for SSTable blocks.
    pub const TABLE: Self = Self {
        domain: "tidal-table-v1",
    };
    /// Hasher for branch index blocks.
    pub const INDEX: Self = Self {
        domain: "tidal-index-v1",
    };
    /// Hasher for structural nodes (namespaces, relationships, repo roots).
    pub const NODE: Self = Self {
        domain: "tidal-node-v1",
    };
    /// Hasher for signed commit blocks.
    pub const COMMIT: Self = Self {
        domain: "tidal-commit-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Cid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Cid::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected CID.
    pub fn verify(&self, data: &[u8], expected: &Cid) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
