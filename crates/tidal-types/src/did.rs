use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const DID_KEY_PREFIX: &str = "did:key:";

/// Decentralized identifier of an account.
///
/// Any `did:<method>:<id>` string is accepted. Repositories signed by a
/// local key use the `did:key:<hex ed25519 public key>` form, from which the
/// verifying key can be recovered without a resolver.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Parse and validate a DID string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidDid {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let rest = s.strip_prefix("did:").ok_or_else(|| invalid("missing did: prefix"))?;
        let (method, id) = rest
            .split_once(':')
            .ok_or_else(|| invalid("missing method-specific id"))?;
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()) {
            return Err(invalid("method must be lowercase alphanumeric"));
        }
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(invalid("method-specific id must be non-empty without whitespace"));
        }
        Ok(Self(s.to_string()))
    }

    /// The `did:key` identifier for a raw 32-byte ed25519 public key.
    pub fn from_key_bytes(key: [u8; 32]) -> Self {
        Self(format!("{DID_KEY_PREFIX}{}", hex::encode(key)))
    }

    /// The public key bytes embedded in a `did:key` identifier, if any.
    pub fn key_bytes(&self) -> Option<[u8; 32]> {
        let encoded = self.0.strip_prefix(DID_KEY_PREFIX)?;
        hex::decode(encoded).ok()?.try_into().ok()
    }

    /// The DID method (`key`, `plc`, `web`, ...).
    pub fn method(&self) -> &str {
        self.0[4..].split(':').next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Did({})", self.0)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Did {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_common_methods() {
        assert_eq!(Did::parse("did:plc:abc123").unwrap().method(), "plc");
        assert_eq!(Did::parse("did:web:example.com").unwrap().method(), "web");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Did::parse("plc:abc").is_err());
        assert!(Did::parse("did:plc").is_err());
        assert!(Did::parse("did::abc").is_err());
        assert!(Did::parse("did:PLC:abc").is_err());
        assert!(Did::parse("did:plc:").is_err());
        assert!(Did::parse("did:plc:a b").is_err());
    }

    #[test]
    fn key_bytes_roundtrip() {
        let did = Did::from_key_bytes([7u8; 32]);
        assert_eq!(did.method(), "key");
        assert_eq!(did.key_bytes(), Some([7u8; 32]));
    }

    #[test]
    fn non_key_did_has_no_key_bytes() {
        let did = Did::parse("did:plc:abc123").unwrap();
        assert!(did.key_bytes().is_none());
    }

    #[test]
    fn serde_roundtrip_and_validation() {
        let did = Did::parse("did:plc:alice").unwrap();
        let json = serde_json::to_string(&did).unwrap();
        assert_eq!(json, "\"did:plc:alice\"");
        assert_eq!(serde_json::from_str::<Did>(&json).unwrap(), did);
        assert!(serde_json::from_str::<Did>("\"alice\"").is_err());
    }

    #[test]
    fn display_is_the_raw_string() {
        let did = Did::parse("did:web:example.com").unwrap();
        assert_eq!(format!("{did}"), "did:web:example.com");
    }
}
