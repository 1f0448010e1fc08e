//! Job task execution: one job from processing to a terminal state.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state for one job task, progress publishing
//! - [`orchestration`] - Top-level lifecycle, timeout, grace period, panic containment
//! - [`items`] - Work item resolution (playlist expansion) and per-item downloads
//! - [`finalization`] - Terminal transition, artifact cleanup, events

mod context;
mod finalization;
mod items;
mod orchestration;

pub(crate) use context::JobTaskContext;
pub(crate) use orchestration::run_job_task;

use crate::types::{Artifact, JobFailure};

/// How a job's work ended, before it is written back to the registry
#[derive(Debug)]
pub(crate) enum JobOutcome {
    /// At least one artifact was produced
    Completed(Vec<Artifact>),
    /// The job failed
    Failed(JobFailure),
    /// A checkpoint observed cancellation
    Cancelled,
}
