use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The record collections held by every namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Authored records (posts, articles).
    Posts,
    /// Records reacting to other records (likes, reposts, replies).
    Interactions,
}

impl Collection {
    /// All collections, in the order their changes are replayed.
    pub const ALL: [Collection; 2] = [Collection::Posts, Collection::Interactions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Interactions => "interactions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posts" => Ok(Self::Posts),
            "interactions" => Ok(Self::Interactions),
            other => Err(TypeError::UnknownCollection(other.to_string())),
        }
    }
}
