//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::{CancelOutcome, Event, Status};

use super::MediaDownloader;

/// Extra time allowed on top of the cancellation grace period
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(2);

impl MediaDownloader {
    /// Gracefully shut down the engine
    ///
    /// 1. Stops accepting new submissions and probes
    /// 2. Cancels every queued job
    /// 3. Requests cancellation of every running job
    /// 4. Waits for workers to drain, bounded by the cancellation grace period
    /// 5. Stops the queue processor and the cleanup scheduler
    ///
    /// Jobs that have not finished by the deadline are left to their workers;
    /// the grace-period guard in each job task still moves them to cancelled.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        let queued: Vec<_> = self.queue_state.queue.lock().await.drain(..).collect();
        for id in queued {
            match self.registry.request_cancel(id) {
                Ok(CancelOutcome::Cancelled) => self.emit_event(Event::Cancelled { id }),
                Ok(CancelOutcome::Requested) => {}
                Err(e) => tracing::debug!(job_id = %id, error = %e, "queued job not cancelable"),
            }
        }

        self.cancel_running();

        let deadline = self
            .config
            .download
            .cancel_grace_period
            .saturating_mul(2)
            .saturating_add(SHUTDOWN_MARGIN);
        match tokio::time::timeout(deadline, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("all active jobs stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = deadline.as_secs(),
                "timeout waiting for active jobs, proceeding with shutdown"
            ),
        }

        self.shutdown_token.cancel();
        self.emit_event(Event::Shutdown);

        tracing::info!("graceful shutdown complete");
        Ok(())
    }

    /// Whether [`MediaDownloader::shutdown`] has started
    pub fn is_shutting_down(&self) -> bool {
        !self.queue_state.accepting_new.load(Ordering::SeqCst)
    }

    fn cancel_running(&self) {
        for id in self.registry.active_ids() {
            if let Err(e) = self.registry.request_cancel(id) {
                tracing::debug!(job_id = %id, error = %e, "job finished before cancellation");
            }
        }
    }

    /// Wait until no worker holds a job
    ///
    /// The queue processor may have taken a job just before admission
    /// stopped, so running jobs are re-cancelled on every poll.
    async fn wait_for_active_jobs(&self) {
        loop {
            let active = self.queue_state.active_jobs.lock().await.len();
            let processing = self.registry.count(Status::Processing);
            if active == 0 && processing == 0 {
                return;
            }

            tracing::debug!(active, processing, "waiting for active jobs to stop");
            self.cancel_running();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
