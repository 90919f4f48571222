//! The module dependency graph: nodes, the def→use index, the
//! integrator that folds per-file graphs into it, and the tracer that
//! computes transitive invalidation.
//!
//! `dep_graph_codec` persists this graph to disk; `dep_scheduler` turns
//! its answers into compile waves. This crate has no notion of either.

pub mod error;
pub mod integrator;
pub mod key;
pub mod module_graph;
pub mod node;
pub mod node_finder;
pub mod per_file;
pub mod tracer;

pub use error::EngineError;
pub use integrator::IntegrationResult;
pub use key::{Aspect, DependencyKey, Designator};
pub use module_graph::{Input, ModuleDependencyGraph};
pub use node::{Node, NodeId, Source};
pub use node_finder::NodeFinder;
pub use per_file::PerFileDependencyGraph;
pub use tracer::Tracer;
