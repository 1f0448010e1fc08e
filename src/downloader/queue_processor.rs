//! Queue processor: hands queued jobs to a bounded pool of workers.

use std::sync::Arc;

use crate::error::Error;
use crate::types::JobId;

use super::MediaDownloader;
use super::job_task::{JobTaskContext, run_job_task};

impl MediaDownloader {
    /// Start the queue processor task
    ///
    /// The processor loops until shutdown:
    /// 1. Acquires a worker slot (waits while `max_concurrent_jobs` jobs run)
    /// 2. Takes the oldest queued job, waiting for one if the queue is empty
    /// 3. Moves it to processing and spawns its task, which holds the slot
    ///
    /// Jobs cancelled while queued are skipped and their slot reused.
    pub fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        tokio::spawn(async move { downloader.process_queue().await })
    }

    async fn process_queue(self) {
        let shutdown = self.shutdown_token.clone();
        tracing::debug!("queue processor started");

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = self.queue_state.concurrent_limit.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    // semaphore closed
                    Err(_) => break,
                },
            };

            let Some(id) = self.next_queued().await else {
                break;
            };

            match self.registry.try_start(id) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(job_id = %id, "skipping job cancelled while queued");
                    continue;
                }
                Err(Error::Job(e)) => {
                    tracing::debug!(job_id = %id, error = %e, "skipping queued job");
                    continue;
                }
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "failed to start job");
                    continue;
                }
            }

            let entry = match self.registry.entry(id) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "job vanished after start");
                    continue;
                }
            };
            let cancel_token = entry.cancel_token().clone();
            self.queue_state
                .active_jobs
                .lock()
                .await
                .insert(id, cancel_token.clone());

            let request = match self.registry.get(id) {
                Ok(job) => job.request,
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "job vanished after start");
                    self.queue_state.active_jobs.lock().await.remove(&id);
                    continue;
                }
            };

            let ctx = JobTaskContext {
                id,
                request,
                registry: Arc::clone(&self.registry),
                artifacts: Arc::clone(&self.artifacts),
                extractor: Arc::clone(&self.extractor),
                config: Arc::clone(&self.config),
                event_tx: self.event_tx.clone(),
                active_jobs: Arc::clone(&self.queue_state.active_jobs),
                cancel_token,
            };

            tokio::spawn(async move {
                let _permit = permit;
                run_job_task(ctx).await;
            });
        }

        tracing::debug!("queue processor stopped");
    }

    /// Wait for the oldest queued job; `None` once shutdown starts
    async fn next_queued(&self) -> Option<JobId> {
        loop {
            if let Some(id) = self.queue_state.queue.lock().await.pop_front() {
                return Some(id);
            }
            tokio::select! {
                _ = self.shutdown_token.cancelled() => return None,
                _ = self.queue_state.queue_notify.notified() => {}
            }
        }
    }
}
