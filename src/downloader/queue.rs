//! Job admission and the FIFO queue.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::types::{Event, JobId, JobRequest};

use super::MediaDownloader;

impl MediaDownloader {
    /// Admit a request from `client` and queue it as a new job
    ///
    /// Rate limiting and validation happen before the job exists, so a
    /// rejected request leaves no trace in the registry. Returns as soon as
    /// the job is queued; it never waits for extraction to start.
    pub async fn submit(&self, client: &str, request: JobRequest) -> Result<JobId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        self.rate_limiter.check(client)?;
        request.validate(&self.config.download)?;

        let kind = request.kind();
        let id = self.registry.create(request);
        self.queue_state.queue.lock().await.push_back(id);
        self.queue_state.queue_notify.notify_one();

        tracing::info!(job_id = %id, ?kind, client, "job queued");
        self.emit_event(Event::Queued { id, kind });
        Ok(id)
    }

    /// Number of jobs waiting for a worker slot
    pub async fn queue_len(&self) -> usize {
        self.queue_state.queue.lock().await.len()
    }

    /// Drop a job from the wait queue; returns whether it was queued
    pub(crate) async fn remove_from_queue(&self, id: JobId) -> bool {
        let mut queue = self.queue_state.queue.lock().await;
        let before = queue.len();
        queue.retain(|queued| *queued != id);
        queue.len() != before
    }
}
