//! The output-file-map collaborator (§6.1): an external boundary the
//! scheduler reads through rather than parses itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Maps an input source path to its emitted dependency-artifact path.
/// Production drivers implement this over the real output-file-map JSON;
/// that reader lives outside this crate.
pub trait OutputFileMap {
    fn deps_artifact_for(&self, input: &Path) -> Option<PathBuf>;
}

/// An in-memory `OutputFileMap`, for tests and drivers that already hold
/// the map.
#[derive(Default)]
pub struct StaticOutputFileMap(HashMap<PathBuf, PathBuf>);

impl StaticOutputFileMap {
    pub fn new() -> Self {
        StaticOutputFileMap::default()
    }

    pub fn insert(&mut self, input: impl Into<PathBuf>, deps_artifact: impl Into<PathBuf>) {
        self.0.insert(input.into(), deps_artifact.into());
    }
}

impl OutputFileMap for StaticOutputFileMap {
    fn deps_artifact_for(&self, input: &Path) -> Option<PathBuf> {
        self.0.get(input).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_registered_artifact_path() {
        let mut map = StaticOutputFileMap::new();
        map.insert("a.rs", "a.deps");
        assert_eq!(map.deps_artifact_for(Path::new("a.rs")), Some(PathBuf::from("a.deps")));
        assert_eq!(map.deps_artifact_for(Path::new("missing.rs")), None);
    }
}
