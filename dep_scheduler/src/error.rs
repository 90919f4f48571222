//! Scheduler-level errors (§7.1). Distinct from `dep_graph_core::EngineError`
//! (programmer-reachable invariant violations) and `dep_graph_codec::CodecError`
//! (malformed bytes): these are the runtime failures a driver actually
//! expects and recovers from.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("missing or unreadable dependency artifact for input `{input}`")]
    MissingArtifact { input: PathBuf },

    #[error("external dependency recursion failed for path `{path}`")]
    ExternalRecursionFailed { path: PathBuf },

    #[error("failed to write module dependency graph")]
    WriteFailed(#[source] dep_graph_codec::CodecError),

    #[error("job_finished called re-entrantly")]
    ReentrantJobCompletion,
}
