//! Job finalization: terminal transition, artifact cleanup, events.

use crate::registry::Transition;
use crate::types::{Event, FailureKind, JobFailure, Status};

use super::JobOutcome;
use super::context::JobTaskContext;

/// Write the job's outcome back to the registry and release its resources
///
/// A cancel request observed at this point wins over any other outcome, so a
/// job cancelled while its last item finished never reports completion.
/// Artifacts of failed or cancelled jobs are deleted before the transition,
/// which keeps "artifacts present" equivalent to "completed".
pub(super) async fn finalize_job(ctx: JobTaskContext, outcome: JobOutcome) {
    let id = ctx.id;
    let outcome = if ctx.is_cancelled() {
        JobOutcome::Cancelled
    } else {
        outcome
    };

    let result = match outcome {
        JobOutcome::Completed(artifacts) => {
            let files: Vec<String> = artifacts.iter().map(|a| a.filename.clone()).collect();
            ctx.registry
                .transition(id, Transition::Complete(artifacts))
                .map(|_| {
                    tracing::info!(job_id = %id, files = files.len(), "job completed");
                    ctx.emit(Event::Completed { id, files });
                })
        }
        JobOutcome::Failed(failure) => {
            ctx.artifacts.remove_job(id).await;
            ctx.registry
                .transition(id, Transition::Fail(failure.clone()))
                .map(|_| {
                    tracing::warn!(job_id = %id, kind = %failure.kind, error = %failure.message, "job failed");
                    ctx.emit(Event::Failed { id, error: failure });
                })
        }
        JobOutcome::Cancelled => {
            ctx.artifacts.remove_job(id).await;
            ctx.registry.transition(id, Transition::Cancel).map(|_| {
                tracing::info!(job_id = %id, "job cancelled");
                ctx.emit(Event::Cancelled { id });
            })
        }
    };

    if let Err(e) = result {
        tracing::error!(job_id = %id, error = %e, "illegal terminal transition, failing job");
        ctx.artifacts.remove_job(id).await;
        let failure = JobFailure::new(FailureKind::Internal, e.to_string());
        match ctx.registry.force_fail(id, failure.clone()) {
            Ok(job) if job.status == Status::Failed => ctx.emit(Event::Failed { id, error: failure }),
            Ok(_) => {}
            Err(e) => tracing::error!(job_id = %id, error = %e, "failed to record job failure"),
        }
    }

    ctx.artifacts.discard_staging(id).await;
    ctx.remove_from_active().await;
}
