//! Bidirectional string interner.
//!
//! Index 0 is always the empty string, matching the wire format's
//! convention that identifier id 0 means "empty" without needing a
//! separate has-name flag on every record.

use rustc_hash::FxHashMap;

/// A handle into a [`StringTable`]. Stable for the lifetime of the table
/// that produced it; handles from different tables must not be mixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedString(u32);

impl InternedString {
    pub const EMPTY: InternedString = InternedString(0);

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn from_u32(raw: u32) -> Self {
        InternedString(raw)
    }
}

/// Single-writer interner: strings go in, handles come out, and a handle
/// always resolves back to the same string for the life of this table.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<Box<str>>,
    index: FxHashMap<Box<str>, InternedString>,
}

impl StringTable {
    pub fn new() -> Self {
        let mut table = StringTable { strings: Vec::new(), index: FxHashMap::default() };
        let empty: Box<str> = "".into();
        table.index.insert(empty.clone(), InternedString::EMPTY);
        table.strings.push(empty);
        table
    }

    /// Interns `s`, returning its existing handle if already present.
    pub fn intern(&mut self, s: &str) -> InternedString {
        if let Some(&handle) = self.index.get(s) {
            return handle;
        }
        let handle = InternedString(self.strings.len() as u32);
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.index.insert(boxed, handle);
        handle
    }

    /// O(1) lookup by handle. Panics if the handle was not produced by
    /// this table (or a table with at least as many entries).
    pub fn lookup(&self, handle: InternedString) -> &str {
        &self.strings[handle.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        // Index 0 (the empty string) always exists, so this is never true
        // for a `StringTable`, but we keep the method for API symmetry with
        // `Vec`/`HashMap` and clippy's `len_without_is_empty` lint.
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InternedString, &str)> {
        self.strings.iter().enumerate().map(|(i, s)| (InternedString(i as u32), s.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_handle_zero() {
        let table = StringTable::new();
        assert_eq!(table.lookup(InternedString::EMPTY), "");
    }

    #[test]
    fn interning_is_stable_and_deduplicates() {
        let mut table = StringTable::new();
        let a1 = table.intern("a");
        let b = table.intern("b");
        let a2 = table.intern("a");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(table.lookup(a1), "a");
        assert_eq!(table.lookup(b), "b");
    }

    #[test]
    fn interning_empty_returns_handle_zero() {
        let mut table = StringTable::new();
        assert_eq!(table.intern(""), InternedString::EMPTY);
    }
}
