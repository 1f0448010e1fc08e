//! Status and control surface: polling, listing, cancellation, retrieval, stats.

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;

use crate::artifacts::ArtifactStream;
use crate::error::{Error, Result};
use crate::extractor::{ExtractorError, FormatGroups, MediaMetadata};
use crate::types::{
    CancelOutcome, DownloadOptions, EngineStats, Event, JobFilter, JobId, JobPage, JobRequest,
    JobSnapshot, Status,
};

use super::MediaDownloader;

impl MediaDownloader {
    /// Point-in-time copy of a job
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`](crate::error::JobError::NotFound) if the id is
    /// unknown or the job was already purged.
    pub fn get_status(&self, id: JobId) -> Result<JobSnapshot> {
        self.registry.get(id)
    }

    /// Cancel a job
    ///
    /// A pending job is cancelled immediately and never starts. A processing
    /// job is flagged; its worker stops at the next checkpoint, deletes any
    /// files it produced and moves the job to cancelled. The returned
    /// [`CancelOutcome`] tells the two cases apart.
    ///
    /// # Errors
    ///
    /// Returns `NotCancelable` for jobs already in a terminal state and
    /// `NotFound` for unknown ids.
    pub async fn cancel(&self, id: JobId) -> Result<CancelOutcome> {
        let outcome = self.registry.request_cancel(id)?;
        match outcome {
            CancelOutcome::Cancelled => {
                self.remove_from_queue(id).await;
                tracing::info!(job_id = %id, "pending job cancelled");
                self.emit_event(Event::Cancelled { id });
            }
            CancelOutcome::Requested => {
                tracing::info!(job_id = %id, "cancellation requested for running job");
            }
        }
        Ok(outcome)
    }

    /// Newest-first page of job summaries
    pub fn list_jobs(&self, filter: &JobFilter) -> JobPage {
        self.registry.list(filter)
    }

    /// Open an artifact for streaming
    ///
    /// # Errors
    ///
    /// `Expired` once the artifact's retention window has passed but before
    /// the cleanup sweep removed it, `NotFound` for unknown, swept or
    /// malformed filenames.
    pub async fn get_artifact(&self, filename: &str) -> Result<ArtifactStream> {
        self.artifacts.open_stream(filename).await
    }

    /// Engine counters
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            pending: self.registry.count(Status::Pending),
            processing: self.registry.count(Status::Processing),
            completed: self.registry.count(Status::Completed),
            failed: self.registry.count(Status::Failed),
            cancelled: self.registry.count(Status::Cancelled),
            queued: self.queue_len().await,
            max_concurrent_jobs: self.config.download.max_concurrent_jobs,
            artifacts: self.artifacts.len(),
            storage_bytes: self.artifacts.total_bytes(),
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
        }
    }

    /// Look up metadata for a URL without creating a job
    ///
    /// Subject to the same admission gate as [`MediaDownloader::submit`].
    pub async fn probe(&self, client: &str, url: &str) -> Result<MediaMetadata> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        self.rate_limiter.check(client)?;
        JobRequest::single(url, DownloadOptions::default()).validate(&self.config.download)?;

        let lookup = AssertUnwindSafe(self.extractor.fetch_metadata(url.trim()))
            .catch_unwind()
            .map(|result| {
                result.unwrap_or_else(|_| Err(ExtractorError::internal("collaborator panicked")))
            });

        let result = match self.config.download.job_timeout {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .map_err(|_| {
                    Error::Timeout(format!("no metadata within {}s", limit.as_secs()))
                })?,
            None => lookup.await,
        };

        result.map_err(|e| {
            tracing::debug!(url, error = %e, "metadata probe failed");
            Error::from(e)
        })
    }

    /// Formats available for a URL, grouped into video-only, audio-only and
    /// combined
    ///
    /// Same admission and error behaviour as [`MediaDownloader::probe`].
    pub async fn list_formats(&self, client: &str, url: &str) -> Result<FormatGroups> {
        let metadata = self.probe(client, url).await?;
        Ok(metadata.format_groups())
    }
}
