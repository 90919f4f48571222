//! End-to-end first/second-wave coverage (§8.1), on top of the graph
//! engine scenarios already covered by `dep_graph_core`'s own unit tests.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dep_graph_core::{Input, ModuleDependencyGraph, Source};
use dep_scheduler::{BuildRecord, JobStatus, Scheduler, StaticOutputFileMap};
use rustc_hash::FxHashSet;

fn t(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dep_scheduler_scenarios_{name}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn set(items: impl IntoIterator<Item = Input>) -> FxHashSet<Input> {
    items.into_iter().collect()
}

#[test]
fn first_wave_classifies_and_speculatively_expands_cascading_inputs() {
    let dir = scratch_dir("first_wave");

    let mut graph = ModuleDependencyGraph::new();
    for name in ["j0", "j1", "j2", "j3"] {
        graph.register_source(Input::new(name), Source::new(format!("{name}.deps")));
    }
    // j2 provides a declaration j3 depends on.
    let j2_source = graph.source_of(&Input::new("j2")).unwrap().clone();
    let j2_graph = dep_graph_core::per_file::parse(j2_source.clone(), "shared\n").unwrap();
    graph.integrate(j2_source, &j2_graph).unwrap();

    let j3_source = graph.source_of(&Input::new("j3")).unwrap().clone();
    let j3_graph = dep_graph_core::per_file::parse(j3_source.clone(), "shared->\n").unwrap();
    graph.integrate(j3_source, &j3_graph).unwrap();

    let mut build_record = BuildRecord::empty(t(100));
    build_record.set_status(PathBuf::from("j0"), JobStatus::UpToDate, t(10));
    build_record.set_status(PathBuf::from("j2"), JobStatus::UpToDate, t(20));
    build_record.set_status(PathBuf::from("j3"), JobStatus::UpToDate, t(5));

    let mut scheduler = Scheduler::new(graph, StaticOutputFileMap::new(), build_record);

    let first_wave = scheduler.start_first_wave(
        &[
            (Input::new("j0"), t(10)), // unchanged -> up to date, skipped
            (Input::new("j1"), t(50)), // unseen -> newly added, scheduled
            (Input::new("j2"), t(90)), // changed -> needs cascading build, scheduled
            (Input::new("j3"), t(5)),  // unchanged on its own, but reachable from j2
        ],
        &[],
    );

    assert!(!first_wave.contains(&Input::new("j0")));
    assert!(first_wave.contains(&Input::new("j1")));
    assert!(first_wave.contains(&Input::new("j2")));
    assert!(
        first_wave.contains(&Input::new("j3")),
        "speculative expansion from j2 should have pulled in j3"
    );
    assert_eq!(scheduler.skipped(), &set([Input::new("j0")]));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn second_wave_unskips_a_dependent_and_signals_once() {
    let dir = scratch_dir("second_wave");

    let mut graph = ModuleDependencyGraph::new();
    graph.register_source(Input::new("j0"), Source::new("j0.deps"));
    graph.register_source(Input::new("j1"), Source::new("j1.deps"));

    let j0_source = graph.source_of(&Input::new("j0")).unwrap().clone();
    let j0_graph = dep_graph_core::per_file::parse(j0_source.clone(), "shared->\n").unwrap();
    graph.integrate(j0_source, &j0_graph).unwrap();

    let j1_source = graph.source_of(&Input::new("j1")).unwrap().clone();
    let j1_graph = dep_graph_core::per_file::parse(j1_source.clone(), "shared@v1\n").unwrap();
    graph.integrate(j1_source, &j1_graph).unwrap();

    // The "recompiled" artifact on disk gives `shared` a new fingerprint.
    let j1_artifact = dir.join("j1.deps");
    fs::write(&j1_artifact, "shared@v2\n").unwrap();
    let j0_artifact = dir.join("j0.deps");
    fs::write(&j0_artifact, "shared->\n").unwrap();

    let mut output_map = StaticOutputFileMap::new();
    output_map.insert("j1", j1_artifact);
    output_map.insert("j0", j0_artifact);

    let mut build_record = BuildRecord::empty(t(100));
    build_record.set_status(PathBuf::from("j0"), JobStatus::UpToDate, t(5));

    let mut scheduler = Scheduler::new(graph, output_map, build_record);

    scheduler.start_first_wave(&[(Input::new("j0"), t(5)), (Input::new("j1"), t(90))], &[]);
    assert_eq!(scheduler.skipped(), &set([Input::new("j0")]));
    assert_eq!(scheduler.incomplete_first_wave(), set([Input::new("j1")]));

    scheduler.job_finished(&Input::new("j1")).unwrap();

    assert!(scheduler.skipped().is_empty(), "j0 should have been pulled out of skipped");
    assert_eq!(scheduler.incomplete_first_wave(), set([Input::new("j0")]));

    // j0 now finishes too; the incomplete set empties and the semaphore
    // is signaled. A subsequent wait must not block.
    scheduler.job_finished(&Input::new("j0")).unwrap();
    assert!(scheduler.incomplete_first_wave().is_empty());
    scheduler.wait_for_first_wave();

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_artifact_during_second_wave_leaves_rest_of_wave_intact() {
    let dir = scratch_dir("missing_artifact");

    let mut graph = ModuleDependencyGraph::new();
    graph.register_source(Input::new("j0"), Source::new("j0.deps"));
    graph.register_source(Input::new("j1"), Source::new("j1.deps"));

    let j0_artifact = dir.join("j0.deps");
    fs::write(&j0_artifact, "top a\n").unwrap();

    let mut output_map = StaticOutputFileMap::new();
    output_map.insert("j0", j0_artifact);
    // j1 is deliberately left unregistered in the output map.

    let build_record = BuildRecord::empty(t(100));
    let mut scheduler = Scheduler::new(graph, output_map, build_record);

    scheduler.start_first_wave(&[(Input::new("j0"), t(50)), (Input::new("j1"), t(50))], &[]);
    assert_eq!(
        scheduler.incomplete_first_wave(),
        set([Input::new("j0"), Input::new("j1")])
    );

    let err = scheduler.job_finished(&Input::new("j1")).unwrap_err();
    assert!(matches!(err, dep_scheduler::SchedulerError::MissingArtifact { .. }));

    // j1 is no longer outstanding (it failed, not silently retried within
    // this wave), but j0's bookkeeping is untouched.
    assert_eq!(scheduler.incomplete_first_wave(), set([Input::new("j0")]));

    scheduler.job_finished(&Input::new("j0")).unwrap();
    assert!(scheduler.incomplete_first_wave().is_empty());
    scheduler.wait_for_first_wave();

    fs::remove_dir_all(&dir).ok();
}
