//! Nodes: vertices of the module dependency graph.

use std::fmt;
use std::sync::Arc;

use dep_data::Fingerprint;

use crate::key::DependencyKey;

/// The dependency-artifact path that owns a node (e.g. `foo.deps`). Cheap
/// to clone; used both as a map key and as the public identity the
/// scheduler maps back to an input file.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Source(Arc<str>);

impl Source {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Source(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Arc<str>>> From<T> for Source {
    fn from(value: T) -> Self {
        Source::new(value)
    }
}

/// A vertex: a key, an optional fingerprint, and an optional owning
/// source. Immutable once constructed — `NodeFinder::insert` replaces a
/// stale node rather than mutating it in place (§3 lifecycle).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Node {
    pub key: DependencyKey,
    pub fingerprint: Option<Fingerprint>,
    pub source: Option<Source>,
}

impl Node {
    pub fn new(key: DependencyKey, fingerprint: Option<Fingerprint>, source: Option<Source>) -> Self {
        Node { key, fingerprint, source }
    }

    pub fn provider(key: DependencyKey, fingerprint: Option<Fingerprint>, source: Source) -> Self {
        Node { key, fingerprint, source: Some(source) }
    }

    /// An expat node: a placeholder for an externally-provided
    /// declaration not yet tied to a file.
    pub fn expat(key: DependencyKey) -> Self {
        Node { key, fingerprint: None, source: None }
    }

    pub fn is_expat(&self) -> bool {
        self.source.is_none()
    }
}

/// A stable handle into a [`crate::node_finder::NodeFinder`]'s arena.
/// Never dereferenced directly by callers outside this crate; all
/// lookups go through the finder so that removed slots can't be
/// accidentally read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
