//! Programmer-reachable invariant violations in the graph engine itself,
//! as opposed to malformed on-disk data (that's `dep_graph_codec::CodecError`)
//! or scheduling failures (`dep_scheduler::SchedulerError`).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("designator code {0} does not name any known case")]
    UnknownDesignatorCode(u8),

    #[error("designator code {code} was given a context/name combination its case forbids")]
    EmptinessViolation { code: u8 },

    #[error("an expat node cannot be the use-end of a def\u{2192}use arc")]
    UseOfExpatNode,
}
