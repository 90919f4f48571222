//! The module dependency graph (§4.H): the public, testable surface that
//! wires the node finder, integrator and tracer together with the
//! bidirectional input↔source map (§3).

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::EngineError;
use crate::integrator::{self, IntegrationResult};
use crate::key::{Aspect, DependencyKey, Designator};
use crate::node::{NodeId, Source};
use crate::node_finder::NodeFinder;
use crate::per_file::PerFileDependencyGraph;
use crate::tracer::Tracer;

/// An input source file path (e.g. `foo.ext`), as distinct from its
/// dependency-artifact [`Source`] (e.g. `foo.deps`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Input(Arc<str>);

impl Input {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Input(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<Arc<str>>> From<T> for Input {
    fn from(value: T) -> Self {
        Input::new(value)
    }
}

/// The incremental-recompilation engine's in-memory state: nodes, the
/// def→use index, traced flags, and the input↔source correspondence
/// established from the output-file-map collaborator at startup.
#[derive(Default)]
pub struct ModuleDependencyGraph {
    finder: NodeFinder,
    tracer: Tracer,
    input_to_source: rustc_hash::FxHashMap<Input, Source>,
    source_to_input: rustc_hash::FxHashMap<Source, Input>,
}

impl ModuleDependencyGraph {
    pub fn new() -> Self {
        ModuleDependencyGraph::default()
    }

    /// Registers the bidirectional input↔source correspondence for one
    /// file. Idempotent for the same pair; re-registering an input under
    /// a different source replaces the mapping.
    pub fn register_source(&mut self, input: Input, source: Source) {
        self.source_to_input.insert(source.clone(), input.clone());
        self.input_to_source.insert(input, source);
    }

    pub fn source_of(&self, input: &Input) -> Option<&Source> {
        self.input_to_source.get(input)
    }

    pub fn input_of(&self, source: &Source) -> Option<&Input> {
        self.source_to_input.get(source)
    }

    fn inputs_for_nodes(&self, nodes: &[NodeId]) -> FxHashSet<Input> {
        nodes
            .iter()
            .filter_map(|&id| self.finder.get(id).source.as_ref())
            .filter_map(|source| self.source_to_input.get(source).cloned())
            .collect()
    }

    /// Folds a freshly decoded per-file graph into the module graph.
    /// Returns `None` only when an external-dependency recursion this
    /// integration depends on has already failed upstream (the engine
    /// itself never produces that case; it is surfaced for callers that
    /// compose this with `dep_scheduler`'s recursive external-dep
    /// handling).
    pub fn integrate(
        &mut self,
        source: Source,
        per_file: &PerFileDependencyGraph,
    ) -> Result<IntegrationResult, EngineError> {
        let result = integrator::integrate(&mut self.finder, source, per_file)?;
        self.tracer.ensure_will_retrace(result.invalidated_nodes.iter().copied());
        Ok(result)
    }

    /// All inputs that must recompile if `input` changes in full: every
    /// node owned by its source, traced transitively. Reflexive on the
    /// first call; idempotent (empty) on a second call with unchanged
    /// traced state.
    pub fn find_jobs_to_recompile_when_whole_job_changes(&mut self, input: &Input) -> FxHashSet<Input> {
        let Some(source) = self.input_to_source.get(input).cloned() else {
            return FxHashSet::default();
        };
        let seeds: Vec<NodeId> = self.finder.owned_by(&source).collect();
        let touched = self.tracer.trace(seeds, &self.finder);
        self.inputs_for_nodes(&touched)
    }

    /// Same as above, seeded with an arbitrary node set (used after
    /// integration, with the invalidated nodes it returned).
    pub fn find_jobs_to_recompile_when_nodes_change(&mut self, nodes: &[NodeId]) -> FxHashSet<Input> {
        let touched = self.tracer.trace(nodes.iter().copied(), &self.finder);
        self.inputs_for_nodes(&touched)
    }

    /// Whether any node owned by `input` has been traced.
    pub fn have_any_nodes_been_traversed_in(&self, input: &Input) -> bool {
        let Some(source) = self.input_to_source.get(input) else {
            return false;
        };
        self.finder.owned_by(source).any(|id| self.tracer.is_traced(id))
    }

    /// Gathers the untraced expat node for `external_path` (if known)
    /// and traces from it, returning the inputs reached.
    pub fn find_externally_dependent_untraced_jobs(&mut self, external_path: &str) -> FxHashSet<Input> {
        let key = DependencyKey::new(
            Aspect::Interface,
            Designator::ExternalDepend { path: external_path.into() },
        );
        let Some(expat_id) = self.finder.get_expat(&key) else {
            return FxHashSet::default();
        };
        if self.tracer.is_traced(expat_id) {
            return FxHashSet::default();
        }
        let touched = self.tracer.trace([expat_id], &self.finder);
        self.inputs_for_nodes(&touched)
    }

    /// The scheduler's primary entry point: traces from `nodes` and
    /// returns the sources of everything newly reached (not mapped to
    /// inputs, since the scheduler itself owns the input↔source map for
    /// its own bookkeeping of external, non-input sources too).
    pub fn collect_transitively_invalidated(&mut self, nodes: &[NodeId]) -> FxHashSet<Source> {
        let touched = self.tracer.trace(nodes.iter().copied(), &self.finder);
        touched.iter().filter_map(|&id| self.finder.get(id).source.clone()).collect()
    }

    pub fn verify(&self) -> Result<(), EngineError> {
        self.finder.verify()
    }

    /// Read-only access to the underlying node store, for `dep_graph_codec`
    /// to persist without this crate needing to know the wire format.
    pub fn finder(&self) -> &NodeFinder {
        &self.finder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::per_file::parse;

    fn graph_with(pairs: &[(&str, &str)]) -> ModuleDependencyGraph {
        let mut graph = ModuleDependencyGraph::new();
        for (input, text) in pairs {
            let source = Source::new(format!("{input}.deps"));
            graph.register_source(Input::new(*input), source.clone());
            let per_file = parse(source.clone(), text).unwrap();
            graph.integrate(source, &per_file).unwrap();
        }
        graph
    }

    #[test]
    fn independent_inputs_trace_only_themselves() {
        let mut graph = graph_with(&[
            ("j0", "a0\na->\n"),
            ("j1", "b0\nb->\n"),
            ("j2", "c0\nc->\n"),
        ]);
        let j0 = graph.find_jobs_to_recompile_when_whole_job_changes(&Input::new("j0"));
        assert_eq!(j0, [Input::new("j0")].into_iter().collect());
        let j2 = graph.find_jobs_to_recompile_when_whole_job_changes(&Input::new("j2"));
        assert_eq!(j2, [Input::new("j2")].into_iter().collect());
        assert!(graph.have_any_nodes_been_traversed_in(&Input::new("j0")));
        assert!(graph.have_any_nodes_been_traversed_in(&Input::new("j1")));
    }

    #[test]
    fn simple_cascading_reaches_dependent_and_then_stops() {
        let mut graph = graph_with(&[("j0", "a\nb\nc\n"), ("j1", "x->\nb->\nz->\n")]);
        let first = graph.find_jobs_to_recompile_when_whole_job_changes(&Input::new("j0"));
        assert_eq!(first, [Input::new("j0"), Input::new("j1")].into_iter().collect());
        let second = graph.find_jobs_to_recompile_when_whole_job_changes(&Input::new("j0"));
        assert!(second.is_empty());
    }

    #[test]
    fn chained_non_cascading_use_stops_propagation() {
        let mut graph = graph_with(&[
            ("j0", "a\nb\nc\n"),
            ("j1", "x->\n#b->\nnominal z\n"),
            ("j2", "nominal z->\n"),
        ]);
        let reached = graph.find_jobs_to_recompile_when_whole_job_changes(&Input::new("j0"));
        assert_eq!(reached, [Input::new("j0"), Input::new("j1")].into_iter().collect());
    }

    #[test]
    fn external_dependency_fan_out() {
        let mut graph = graph_with(&[("j0", "external /foo->\nexternal /bar->\n")]);
        let first = graph.find_externally_dependent_untraced_jobs("/foo");
        assert_eq!(first, [Input::new("j0")].into_iter().collect());
        let second = graph.find_externally_dependent_untraced_jobs("/foo");
        assert!(second.is_empty());
        let bar = graph.find_externally_dependent_untraced_jobs("/bar");
        assert!(bar.is_empty());
    }

    #[test]
    fn reload_detects_change_and_invalidates_dependents() {
        let mut graph = graph_with(&[
            ("j0", "nominal a\n"),
            ("j1", "nominal a->\n"),
            ("j2", "nominal b->\n"),
        ]);
        // Trace from j1 so its own node is already traced before reload.
        graph.find_jobs_to_recompile_when_whole_job_changes(&Input::new("j1"));

        let j0_source = graph.source_of(&Input::new("j0")).unwrap().clone();
        let reloaded = parse(j0_source.clone(), "nominal b\nnominal a->\n").unwrap();
        let result = graph.integrate(j0_source, &reloaded).unwrap();
        let invalidated = graph.find_jobs_to_recompile_when_nodes_change(&result.invalidated_nodes);
        assert!(invalidated.contains(&Input::new("j1")));
    }

    #[test]
    fn fingerprint_scoped_change_only_invalidates_its_own_users() {
        let mut graph = graph_with(&[
            ("j0", "nominal A1@1\nnominal A2@2\n"),
            ("j1", "nominal B1\nnominal A1->\n"),
            ("j2", "nominal C1\nnominal A2->\n"),
            ("j3", "nominal D1\n"),
        ]);
        let j0_source = graph.source_of(&Input::new("j0")).unwrap().clone();
        let reloaded = parse(j0_source.clone(), "nominal A1@11\nnominal A2@2\n").unwrap();
        let result = graph.integrate(j0_source, &reloaded).unwrap();
        let invalidated = graph.find_jobs_to_recompile_when_nodes_change(&result.invalidated_nodes);
        assert!(invalidated.contains(&Input::new("j0")));
        assert!(invalidated.contains(&Input::new("j1")));
        // A2's fingerprint is unchanged, so its sole user j2 is unaffected.
        assert!(!invalidated.contains(&Input::new("j2")));
        assert!(!invalidated.contains(&Input::new("j3")));
    }
}
