//! Job task orchestration: top-level lifecycle for a single job.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::types::{Event, FailureKind, JobFailure};

use super::JobOutcome;
use super::context::JobTaskContext;
use super::finalization::finalize_job;
use super::items::{resolve_items, run_items};

/// Core job task, runs once the job is in processing.
///
/// Phases:
/// 1. Prepare the staging directory
/// 2. Resolve work items (expanding playlists through the collaborator)
/// 3. Download items in index order with checkpoints between them
/// 4. Write the terminal state back and clean up
///
/// Phases 1-3 run under the optional job timeout and the cancellation grace
/// period; a panic inside them fails the job instead of the worker.
pub(crate) async fn run_job_task(ctx: JobTaskContext) {
    let id = ctx.id;
    tracing::info!(job_id = %id, kind = ?ctx.request.kind(), "job started");
    ctx.emit(Event::Started { id });

    let outcome = run_guarded(&ctx).await;
    finalize_job(ctx, outcome).await;
}

async fn run_guarded(ctx: &JobTaskContext) -> JobOutcome {
    let work = AssertUnwindSafe(execute(ctx))
        .catch_unwind()
        .map(|result| {
            result.unwrap_or_else(|_| {
                tracing::error!(job_id = %ctx.id, "job task panicked");
                JobOutcome::Failed(JobFailure::new(FailureKind::Internal, "job task panicked"))
            })
        });

    let bounded = async {
        match ctx.config.download.job_timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                tracing::warn!(job_id = %ctx.id, timeout_secs = limit.as_secs(), "job timed out");
                JobOutcome::Failed(JobFailure::new(
                    FailureKind::Timeout,
                    format!("job exceeded {}s", limit.as_secs_f64()),
                ))
            }),
            None => work.await,
        }
    };

    let grace = ctx.config.download.cancel_grace_period;
    tokio::select! {
        biased;
        outcome = bounded => outcome,
        _ = grace_expired(ctx, grace) => {
            tracing::warn!(
                job_id = %ctx.id,
                grace_secs = grace.as_secs_f64(),
                "job did not reach a checkpoint within the grace period, abandoning it"
            );
            JobOutcome::Cancelled
        }
    }
}

async fn grace_expired(ctx: &JobTaskContext, grace: Duration) {
    ctx.cancel_token.cancelled().await;
    tokio::time::sleep(grace).await;
}

async fn execute(ctx: &JobTaskContext) -> JobOutcome {
    if ctx.is_cancelled() {
        return JobOutcome::Cancelled;
    }

    let work_dir = match ctx.artifacts.prepare_staging(ctx.id).await {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!(job_id = %ctx.id, error = %e, "failed to create staging directory");
            return JobOutcome::Failed(JobFailure::new(
                FailureKind::Internal,
                format!("failed to create staging directory: {e}"),
            ));
        }
    };

    let items = match resolve_items(ctx).await {
        Ok(items) => items,
        Err(outcome) => return outcome,
    };
    if let Err(e) = ctx.registry.set_total_items(ctx.id, items.len()) {
        tracing::error!(job_id = %ctx.id, error = %e, "failed to record item count");
    }

    run_items(ctx, items, &work_dir).await
}
