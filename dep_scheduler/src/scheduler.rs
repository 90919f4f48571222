//! The scheduler (§4.J): turns the graph engine's answers into first-
//! and second-wave compile sets.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dep_graph_core::{Input, ModuleDependencyGraph, Source};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::build_record::{BuildRecord, JobStatus};
use crate::collab::OutputFileMap;
use crate::config::EngineConfig;
use crate::error::SchedulerError;
use crate::sync::{CountingSemaphore, ReentrancyGuard};

pub struct Scheduler<M: OutputFileMap> {
    graph: ModuleDependencyGraph,
    output_map: M,
    build_record: BuildRecord,
    skipped: FxHashSet<Input>,
    incomplete_first_wave: Mutex<FxHashSet<Input>>,
    ready: CountingSemaphore,
    reentrancy: ReentrancyGuard,
    run_speculative_cascading_expansion: bool,
    trust_mtime_only_up_to_date: bool,
}

impl<M: OutputFileMap> Scheduler<M> {
    pub fn new(graph: ModuleDependencyGraph, output_map: M, build_record: BuildRecord) -> Self {
        Scheduler {
            graph,
            output_map,
            build_record,
            skipped: FxHashSet::default(),
            incomplete_first_wave: Mutex::new(FxHashSet::default()),
            ready: CountingSemaphore::new(),
            reentrancy: ReentrancyGuard::new(),
            run_speculative_cascading_expansion: true,
            trust_mtime_only_up_to_date: true,
        }
    }

    /// Builds a scheduler from a driver-assembled [`EngineConfig`],
    /// carrying its two knobs (§2.1) forward into the first-wave logic.
    pub fn with_config(
        graph: ModuleDependencyGraph,
        build_record: BuildRecord,
        config: EngineConfig<M>,
    ) -> Self {
        let mut scheduler = Scheduler::new(graph, config.output_file_map, build_record);
        scheduler.run_speculative_cascading_expansion = config.run_speculative_cascading_expansion;
        scheduler.trust_mtime_only_up_to_date = config.trust_mtime_only_up_to_date;
        scheduler
    }

    pub fn graph(&self) -> &ModuleDependencyGraph {
        &self.graph
    }

    pub fn skipped(&self) -> &FxHashSet<Input> {
        &self.skipped
    }

    pub fn incomplete_first_wave(&self) -> FxHashSet<Input> {
        self.incomplete_first_wave.lock().clone()
    }

    /// §4.J first wave: classifies every input, folds in untraced
    /// external-dependency fan-out, speculatively expands cascading
    /// inputs, and returns the sorted first-wave set (its complement
    /// becomes `skipped`).
    pub fn start_first_wave(
        &mut self,
        inputs: &[(Input, SystemTime)],
        external_deps: &[(PathBuf, SystemTime)],
    ) -> Vec<Input> {
        let mut scheduled: FxHashSet<Input> = FxHashSet::default();
        let mut prior_status: FxHashMap<Input, JobStatus> = FxHashMap::default();

        for (input, mtime) in inputs {
            let path = PathBuf::from(input.as_str());
            let mut status = self.build_record.classify(&path, *mtime);
            if status == JobStatus::UpToDate && !self.trust_mtime_only_up_to_date {
                // Don't take mtime's word for it; schedule a non-cascading
                // verification build instead of skipping outright.
                status = JobStatus::NeedsNonCascadingBuild;
            }
            prior_status.insert(input.clone(), status);
            // An mtime that isn't strictly earlier than the last build is
            // indistinguishable from "changed during that very build" —
            // clock skew or a same-second edit — so it must still be
            // scheduled even though classification alone says up to date.
            let not_older_than_last_build = *mtime >= self.build_record.build_time;
            if status != JobStatus::UpToDate || not_older_than_last_build {
                scheduled.insert(input.clone());
            }
        }

        for (path, mtime) in external_deps {
            if *mtime >= self.build_record.build_time {
                let path_str = path.to_string_lossy();
                for dependent in self.graph.find_externally_dependent_untraced_jobs(&path_str) {
                    scheduled.insert(dependent);
                }
            }
        }

        if self.run_speculative_cascading_expansion {
            let cascading_seeds: Vec<Input> = scheduled
                .iter()
                .filter(|input| prior_status.get(*input) == Some(&JobStatus::NeedsCascadingBuild))
                .cloned()
                .collect();
            for input in cascading_seeds {
                for dependent in self.graph.find_jobs_to_recompile_when_whole_job_changes(&input) {
                    scheduled.insert(dependent);
                }
            }
        }

        let mut first_wave: Vec<Input> = scheduled.iter().cloned().collect();
        first_wave.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        self.skipped =
            inputs.iter().map(|(input, _)| input.clone()).filter(|input| !scheduled.contains(input)).collect();
        *self.incomplete_first_wave.lock() = scheduled;

        first_wave
    }

    /// §4.J second wave, one job at a time. Re-reads and integrates the
    /// finished input's per-file graph; anything it invalidates that was
    /// sitting in `skipped` gets pulled into the incomplete set. Signals
    /// `ready` once nothing is left outstanding.
    ///
    /// A missing/unreadable artifact never poisons the rest of the wave
    /// (§7): the input is dropped from bookkeeping and the error is
    /// returned for the caller to fall back to full recompilation of
    /// just that input.
    pub fn job_finished(&mut self, input: &Input) -> Result<(), SchedulerError> {
        let _guard = self.reentrancy.enter()?;

        let outcome = self.read_and_integrate(input);

        let mut incomplete = self.incomplete_first_wave.lock();
        incomplete.remove(input);
        match &outcome {
            Ok(newly_unlocked) => {
                for candidate in newly_unlocked {
                    if self.skipped.remove(candidate) {
                        incomplete.insert(candidate.clone());
                    }
                }
            }
            Err(err) => {
                warn!(input = input.as_str(), error = %err, "falling back to full recompilation");
            }
        }
        if incomplete.is_empty() {
            self.ready.signal();
        }
        drop(incomplete);

        outcome.map(|_| ())
    }

    fn read_and_integrate(&mut self, input: &Input) -> Result<FxHashSet<Input>, SchedulerError> {
        let input_path = PathBuf::from(input.as_str());
        let deps_path = self
            .output_map
            .deps_artifact_for(&input_path)
            .ok_or_else(|| SchedulerError::MissingArtifact { input: input_path.clone() })?;
        let text = fs::read_to_string(&deps_path)
            .map_err(|_| SchedulerError::MissingArtifact { input: input_path.clone() })?;

        let source = self.graph.source_of(input).cloned().unwrap_or_else(|| {
            let source = Source::new(deps_path.to_string_lossy().into_owned());
            self.graph.register_source(input.clone(), source.clone());
            source
        });
        let per_file = dep_graph_core::per_file::parse(source.clone(), &text)
            .map_err(|_| SchedulerError::MissingArtifact { input: input_path.clone() })?;

        let result = self
            .graph
            .integrate(source, &per_file)
            .expect("a correctly-formed per-file graph cannot violate engine invariants");
        Ok(self.graph.find_jobs_to_recompile_when_nodes_change(&result.invalidated_nodes))
    }

    /// Folds an external dependency's own per-file graph into the
    /// module graph (the external module changed and must be
    /// re-integrated before fan-out can be recomputed), returning the
    /// inputs it newly makes reachable.
    pub fn integrate_external(
        &mut self,
        external_path: &Path,
        per_file_path: &Path,
    ) -> Result<FxHashSet<Input>, SchedulerError> {
        let text = fs::read_to_string(per_file_path)
            .map_err(|_| SchedulerError::ExternalRecursionFailed { path: external_path.to_path_buf() })?;
        let source = Source::new(external_path.to_string_lossy().into_owned());
        let per_file = dep_graph_core::per_file::parse(source.clone(), &text)
            .map_err(|_| SchedulerError::ExternalRecursionFailed { path: external_path.to_path_buf() })?;
        self.graph
            .integrate(source, &per_file)
            .expect("a correctly-formed per-file graph cannot violate engine invariants");

        let path_str = external_path.to_string_lossy();
        Ok(self.graph.find_externally_dependent_untraced_jobs(&path_str))
    }

    /// Blocks the control thread until the first wave has fully drained.
    pub fn wait_for_first_wave(&self) {
        self.ready.wait();
    }

    pub fn persist_graph(&self, path: &Path, compiler_version: &str) -> Result<(), SchedulerError> {
        dep_graph_codec::SerializedModuleGraph::write(self.graph.finder(), compiler_version, path)
            .map_err(SchedulerError::WriteFailed)
    }

    pub fn persist_build_record(&self, path: &Path) -> std::io::Result<()> {
        self.build_record.save(path)
    }
}
