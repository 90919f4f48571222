//! Driver-supplied engine configuration (§2.1). Constructed once by the
//! external driver and threaded in explicitly — no global/static config.

use std::path::PathBuf;

use anyhow::Context;

use crate::build_record::BuildRecord;
use crate::collab::OutputFileMap;

/// Paths and knobs a driver assembles before constructing a [`crate::Scheduler`].
///
/// `run_speculative_cascading_expansion` and `trust_mtime_only_up_to_date`
/// are the two scheduler-visible knobs named in the ambient stack: the
/// first toggles §4.J's first-wave speculative expansion step, the second
/// controls whether an unchanged mtime alone is enough to skip an input.
pub struct EngineConfig<M: OutputFileMap> {
    pub module_graph_path: PathBuf,
    pub build_record_path: PathBuf,
    pub output_file_map: M,
    pub run_speculative_cascading_expansion: bool,
    pub trust_mtime_only_up_to_date: bool,
}

impl<M: OutputFileMap> EngineConfig<M> {
    pub fn new(module_graph_path: PathBuf, build_record_path: PathBuf, output_file_map: M) -> Self {
        EngineConfig {
            module_graph_path,
            build_record_path,
            output_file_map,
            run_speculative_cascading_expansion: true,
            trust_mtime_only_up_to_date: true,
        }
    }

    /// Loads the persisted build record, or a fresh empty one if this is
    /// the first build. Driver-level ad hoc context (`anyhow`) belongs at
    /// this boundary, not inside `BuildRecord` itself — the engine crates
    /// keep their own typed errors (§7.1).
    pub fn load_build_record(&self, build_time: std::time::SystemTime) -> anyhow::Result<BuildRecord> {
        if !self.build_record_path.exists() {
            return Ok(BuildRecord::empty(build_time));
        }
        BuildRecord::load(&self.build_record_path).with_context(|| {
            format!("failed to read build record at {}", self.build_record_path.display())
        })
    }
}
