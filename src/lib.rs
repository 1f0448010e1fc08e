//! # media-dl
//!
//! Job orchestration engine for asynchronous media downloads.
//!
//! Requests (single URLs, batches, playlists, platform-specific content) become
//! jobs that run on a bounded worker pool. Their progress can be polled or
//! streamed, and their output files stay retrievable for a bounded time. The
//! actual media retrieval is delegated to a [`MediaExtractor`] supplied by the
//! embedding application; HTTP routing is left to the caller as well.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_dl::{Config, DownloadOptions, JobRequest, MediaDownloader, MediaExtractor, Quality};
//!
//! # async fn example(extractor: Arc<dyn MediaExtractor>) -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = MediaDownloader::new(Config::default(), extractor).await?;
//! let _tasks = downloader.start();
//!
//! let id = downloader
//!     .submit(
//!         "203.0.113.7",
//!         JobRequest::single("https://example.com/watch?v=1", DownloadOptions::with_quality(Quality::P720)),
//!     )
//!     .await?;
//!
//! let mut events = downloader.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Artifact storage and retrieval
pub mod artifacts;
/// Periodic cleanup of expired artifacts and jobs
pub mod cleanup;
/// Configuration types
pub mod config;
/// Job engine (submission, worker pool, control surface)
pub mod downloader;
/// Error types
pub mod error;
/// Media extraction collaborator contract
pub mod extractor;
/// Per-client rate limiting
pub mod rate_limiter;
/// Job registry and state machine
pub mod registry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use artifacts::{ArtifactStore, ArtifactStream};
pub use cleanup::{CleanupReport, CleanupScheduler};
pub use config::{Config, DownloadConfig, RateLimitConfig, RetentionConfig};
pub use downloader::{BackgroundTasks, MediaDownloader};
pub use error::{ApiError, ArtifactError, Error, ErrorDetail, JobError, Result, ToHttpStatus};
pub use extractor::{
    Cancelled, DownloadRequest, ExtractorError, FormatGroups, MediaExtractor, MediaFormat,
    MediaMetadata, OutputFile, PlaylistEntry, ProgressHandle,
};
pub use rate_limiter::RateLimiter;
pub use registry::JobRegistry;
pub use types::{
    Artifact, AudioFormat, CancelOutcome, ContentType, DownloadOptions, EngineStats, Event,
    FailureKind, ItemResult, ItemStatus, JobFailure, JobFilter, JobId, JobKind, JobPage,
    JobRequest, JobSnapshot, JobSummary, OutputType, Platform, PlatformItem, Quality, Status,
};

/// Run until SIGINT/SIGTERM (Ctrl+C elsewhere), then shut the engine down
///
/// Queued and running jobs are cancelled as described on
/// [`MediaDownloader::shutdown`].
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    let received = wait_for_signal().await;
    tracing::info!(signal = received, "termination signal received");
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    fn register(kind: SignalKind, name: &'static str) -> Option<(Signal, &'static str)> {
        match signal(kind) {
            Ok(stream) => Some((stream, name)),
            Err(e) => {
                tracing::warn!(signal = name, error = %e, "signal handler unavailable");
                None
            }
        }
    }

    match (
        register(SignalKind::terminate(), "SIGTERM"),
        register(SignalKind::interrupt(), "SIGINT"),
    ) {
        (Some((mut term, _)), Some((mut int, _))) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        (Some((mut only, name)), None) | (None, Some((mut only, name))) => {
            only.recv().await;
            name
        }
        (None, None) => wait_for_ctrl_c().await,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
    "ctrl-c"
}
