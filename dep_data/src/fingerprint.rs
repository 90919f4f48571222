//! Opaque per-declaration fingerprint.
//!
//! The engine never looks inside a fingerprint; it only compares two of
//! them for equality to decide whether a declaration's body changed. The
//! compiler back-end owns the hashing scheme (source text hash, AST hash,
//! whatever); we just carry the bytes it gives us.

use std::fmt;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(Box<str>);

impl Fingerprint {
    pub fn new(bytes: impl Into<Box<str>>) -> Self {
        Fingerprint(bytes.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:?})", self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Fingerprint::new(s)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint::new(s)
    }
}
