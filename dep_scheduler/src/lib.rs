//! Turns the graph engine's answers into compile waves (§4.J): the
//! first-wave classification against a persisted build record, and the
//! second-wave re-integration that pulls `skipped` inputs back in as
//! their dependencies turn out to have changed.

pub mod build_record;
pub mod collab;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod sync;

pub use build_record::{BuildRecord, InputStatus, JobStatus};
pub use collab::{OutputFileMap, StaticOutputFileMap};
pub use config::EngineConfig;
pub use error::SchedulerError;
pub use scheduler::Scheduler;
pub use sync::{CountingSemaphore, ReentrancyGuard};
