use std::collections::HashSet;

use tidal_types::{Collection, Did};

/// What a write touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteScope<'a> {
    /// An entry in one collection of a namespace.
    Entry {
        namespace: &'a str,
        collection: Collection,
    },
    /// A whole namespace (deletion).
    Namespace(&'a str),
    /// The follow index.
    Relationships,
}

impl std::fmt::Display for WriteScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry {
                namespace,
                collection,
            } => write!(f, "{namespace}/{collection}"),
            Self::Namespace(namespace) => write!(f, "namespace {namespace}"),
            Self::Relationships => write!(f, "relationships"),
        }
    }
}

/// Capability check consulted before every repository write.
pub trait WriteAuthority: Send + Sync {
    fn authorize(&self, did: &Did, scope: &WriteScope<'_>) -> bool;
}

/// Grants every write.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl WriteAuthority for AllowAll {
    fn authorize(&self, _did: &Did, _scope: &WriteScope<'_>) -> bool {
        true
    }
}

/// Grants writes only inside the listed namespaces. Relationship writes are
/// granted when `relationships` is set.
#[derive(Clone, Debug, Default)]
pub struct NamespaceGrant {
    pub namespaces: HashSet<String>,
    pub relationships: bool,
}

impl NamespaceGrant {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            relationships: false,
        }
    }

    pub fn with_relationships(mut self) -> Self {
        self.relationships = true;
        self
    }
}

impl WriteAuthority for NamespaceGrant {
    fn authorize(&self, _did: &Did, scope: &WriteScope<'_>) -> bool {
        match scope {
            WriteScope::Entry { namespace, .. } | WriteScope::Namespace(namespace) => {
                self.namespaces.contains(*namespace)
            }
            WriteScope::Relationships => self.relationships,
        }
    }
}
