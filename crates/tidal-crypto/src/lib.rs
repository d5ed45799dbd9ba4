//! Cryptographic primitives for Tidal repositories.
//!
//! Provides domain-separated BLAKE3 hashing for content identifiers and
//! Ed25519 signing/verification for repository commits.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
