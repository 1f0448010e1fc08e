//! Core engine split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Admission (rate limit, validation) and the FIFO job queue
//! - [`queue_processor`] - Bounded worker pool that starts queued jobs
//! - [`job_task`] - Execution of a single job against the collaborator
//! - [`control`] - Status, listing, cancellation, retrieval, stats
//! - [`services`] - Background task starters
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod job_task;
mod lifecycle;
mod queue;
mod queue_processor;
mod services;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use services::BackgroundTasks;

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, Notify, Semaphore, broadcast};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::MediaExtractor;
use crate::rate_limiter::RateLimiter;
use crate::registry::JobRegistry;
use crate::types::{Event, JobId};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Queue and worker slot state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Admitted jobs waiting for a worker slot, in admission order
    pub(crate) queue: Arc<Mutex<VecDeque<JobId>>>,
    /// Wakes the queue processor when a job is queued
    pub(crate) queue_notify: Arc<Notify>,
    /// Worker slots (max_concurrent_jobs permits)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Running jobs and their cancellation tokens
    pub(crate) active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Job registry
    pub(crate) registry: Arc<JobRegistry>,
    /// Artifact store
    pub(crate) artifacts: Arc<ArtifactStore>,
    /// Admission gate
    pub(crate) rate_limiter: Arc<RateLimiter>,
    /// Extraction collaborator
    pub(crate) extractor: Arc<dyn MediaExtractor>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Queue and worker slot state
    pub(crate) queue_state: QueueState,
    /// Stops background tasks
    pub(crate) shutdown_token: CancellationToken,
    /// Creation time, for uptime
    pub(crate) started_at: DateTime<Utc>,
}

impl MediaDownloader {
    /// Create a new engine
    ///
    /// Validates the configuration and opens the artifact directory. No
    /// background task runs until [`MediaDownloader::start`] is called.
    pub async fn new(config: Config, extractor: Arc<dyn MediaExtractor>) -> Result<Self> {
        config.validate()?;

        let artifacts = ArtifactStore::open(
            config.download.download_dir.clone(),
            config.retention.artifact_ttl,
        )
        .await
        .map_err(|e| match e {
            Error::Io(io) => Error::Io(std::io::Error::new(
                io.kind(),
                format!(
                    "Failed to create download directory '{}': {}",
                    config.download.download_dir.display(),
                    io
                ),
            )),
            other => other,
        })?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let queue_state = QueueState {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            queue_notify: Arc::new(Notify::new()),
            concurrent_limit: Arc::new(Semaphore::new(config.download.max_concurrent_jobs)),
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        tracing::info!(
            extractor = extractor.name(),
            download_dir = %config.download.download_dir.display(),
            max_concurrent_jobs = config.download.max_concurrent_jobs,
            artifact_ttl_secs = config.retention.artifact_ttl.as_secs(),
            "media downloader initialized"
        );

        Ok(Self {
            registry: Arc::new(JobRegistry::new()),
            artifacts: Arc::new(artifacts),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            extractor,
            event_tx,
            config: Arc::new(config),
            queue_state,
            shutdown_token: CancellationToken::new(),
            started_at: Utc::now(),
        })
    }

    /// Subscribe to job events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls behind by more than the channel capacity receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Job events as a stream; lagged gaps are skipped
    pub fn event_stream(&self) -> impl tokio_stream::Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.event_tx.subscribe()).filter_map(|event| event.ok())
    }

    /// Engine configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Emit an event to all subscribers
    ///
    /// Sending with no subscribers is not an error.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
