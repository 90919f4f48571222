//! The build record (§4.J.1): the persisted classification driving the
//! first wave's up-to-date/newly-added/needs-rebuild decision.
//!
//! Persisted as small tab-separated text, deliberately not the `DDEP`
//! binary format `dep_graph_codec` uses for the module graph itself — one
//! file is performance-critical and opaque, the other is small and worth
//! being able to `cat`.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type InputPath = PathBuf;

/// The four classification outcomes from the first wave, plus `Failed`
/// for an input whose previous compile didn't complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    UpToDate,
    NewlyAdded,
    NeedsCascadingBuild,
    NeedsNonCascadingBuild,
    Failed,
}

impl JobStatus {
    fn as_str(self) -> &'static str {
        match self {
            JobStatus::UpToDate => "up_to_date",
            JobStatus::NewlyAdded => "newly_added",
            JobStatus::NeedsCascadingBuild => "needs_cascading_build",
            JobStatus::NeedsNonCascadingBuild => "needs_non_cascading_build",
            JobStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<JobStatus> {
        Some(match s {
            "up_to_date" => JobStatus::UpToDate,
            "newly_added" => JobStatus::NewlyAdded,
            "needs_cascading_build" => JobStatus::NeedsCascadingBuild,
            "needs_non_cascading_build" => JobStatus::NeedsNonCascadingBuild,
            "failed" => JobStatus::Failed,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct InputStatus {
    pub status: JobStatus,
    pub mtime: SystemTime,
}

/// What the previous successful build knew about each input, plus the
/// time that build finished.
#[derive(Debug)]
pub struct BuildRecord {
    pub build_time: SystemTime,
    pub statuses: HashMap<InputPath, InputStatus>,
}

impl BuildRecord {
    pub fn empty(build_time: SystemTime) -> Self {
        BuildRecord { build_time, statuses: HashMap::new() }
    }

    /// Classifies `input` given its current modification time.
    ///
    /// A `Failed` input is always scheduled again, regardless of mtime.
    /// An input unseen in the previous build is `NewlyAdded`. Otherwise,
    /// an unchanged mtime keeps the input `UpToDate`; a changed one
    /// inherits the rebuild kind (cascading/non-cascading) the input
    /// needed the last time it changed, defaulting to cascading the
    /// first time — the actual kind is only known once the compiler
    /// re-emits and integrates the file's per-file graph, so this is a
    /// conservative placeholder the second wave may narrow.
    pub fn classify(&self, input: &Path, current_mtime: SystemTime) -> JobStatus {
        match self.statuses.get(input) {
            None => JobStatus::NewlyAdded,
            Some(prev) if prev.status == JobStatus::Failed => JobStatus::Failed,
            Some(prev) if prev.mtime == current_mtime => JobStatus::UpToDate,
            Some(prev) => match prev.status {
                JobStatus::NeedsNonCascadingBuild => JobStatus::NeedsNonCascadingBuild,
                _ => JobStatus::NeedsCascadingBuild,
            },
        }
    }

    pub fn set_status(&mut self, input: InputPath, status: JobStatus, mtime: SystemTime) {
        self.statuses.insert(input, InputStatus { status, mtime });
    }

    pub fn load(path: &Path) -> io::Result<BuildRecord> {
        let file = std::fs::File::open(path)?;
        let mut lines = io::BufReader::new(file).lines();

        let header = lines.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "empty build record")
        })??;
        let build_time = parse_header(&header)?;

        let mut statuses = HashMap::new();
        for line in lines {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(3, '\t');
            let path = fields.next().ok_or_else(malformed)?;
            let status = fields.next().and_then(JobStatus::parse).ok_or_else(malformed)?;
            let mtime_nanos: u64 = fields.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
            statuses.insert(
                PathBuf::from(path),
                InputStatus { status, mtime: UNIX_EPOCH + Duration::from_nanos(mtime_nanos) },
            );
        }

        Ok(BuildRecord { build_time, statuses })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut out = std::fs::File::create(path)?;
        writeln!(out, "#build_time\t{}", to_nanos(self.build_time))?;
        for (path, status) in &self.statuses {
            writeln!(
                out,
                "{}\t{}\t{}",
                path.display(),
                status.status.as_str(),
                to_nanos(status.mtime)
            )?;
        }
        Ok(())
    }
}

fn malformed() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "malformed build record line")
}

fn parse_header(line: &str) -> io::Result<SystemTime> {
    let nanos = line.strip_prefix("#build_time\t").and_then(|s| s.parse::<u64>().ok()).ok_or_else(malformed)?;
    Ok(UNIX_EPOCH + Duration::from_nanos(nanos))
}

fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn unseen_input_is_newly_added() {
        let record = BuildRecord::empty(t(100));
        assert_eq!(record.classify(Path::new("new.rs"), t(50)), JobStatus::NewlyAdded);
    }

    #[test]
    fn unchanged_mtime_is_up_to_date() {
        let mut record = BuildRecord::empty(t(100));
        record.set_status(PathBuf::from("a.rs"), JobStatus::UpToDate, t(10));
        assert_eq!(record.classify(Path::new("a.rs"), t(10)), JobStatus::UpToDate);
    }

    #[test]
    fn changed_mtime_needs_cascading_build_by_default() {
        let mut record = BuildRecord::empty(t(100));
        record.set_status(PathBuf::from("a.rs"), JobStatus::UpToDate, t(10));
        assert_eq!(record.classify(Path::new("a.rs"), t(20)), JobStatus::NeedsCascadingBuild);
    }

    #[test]
    fn failed_input_is_always_scheduled() {
        let mut record = BuildRecord::empty(t(100));
        record.set_status(PathBuf::from("a.rs"), JobStatus::Failed, t(10));
        assert_eq!(record.classify(Path::new("a.rs"), t(10)), JobStatus::Failed);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = std::env::temp_dir().join("dep_scheduler_build_record_roundtrip_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("build_record.txt");

        let mut record = BuildRecord::empty(t(100));
        record.set_status(PathBuf::from("a.rs"), JobStatus::UpToDate, t(10));
        record.set_status(PathBuf::from("b.rs"), JobStatus::NeedsNonCascadingBuild, t(30));
        record.save(&path).unwrap();

        let loaded = BuildRecord::load(&path).unwrap();
        assert_eq!(loaded.build_time, t(100));
        assert_eq!(loaded.statuses.get(Path::new("a.rs")).unwrap().status, JobStatus::UpToDate);
        assert_eq!(
            loaded.statuses.get(Path::new("b.rs")).unwrap().status,
            JobStatus::NeedsNonCascadingBuild
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
