//! Small shared building blocks used by the dependency-graph crates:
//! interned strings and the opaque fingerprint type nodes carry.
//!
//! Kept separate from `dep_graph_core`, the same way low-level data
//! structures are split from the graph logic that builds on them: these
//! types have no notion of dependency graphs at all.

pub mod fingerprint;
pub mod intern;

pub use fingerprint::Fingerprint;
pub use intern::{InternedString, StringTable};
