//! Cleanup scheduler
//!
//! Background task that periodically deletes expired artifacts, purges job
//! records whose retention has run out and drops idle rate-limit state.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::artifacts::ArtifactStore;
use crate::config::RetentionConfig;
use crate::rate_limiter::RateLimiter;
use crate::registry::JobRegistry;
use crate::types::Event;

/// What one sweep removed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Expired artifacts deleted
    pub artifacts_removed: usize,
    /// Bytes freed by deleting expired artifacts
    pub bytes_freed: u64,
    /// Stray files deleted from the download directory
    pub untracked_removed: usize,
    /// Job records purged from the registry
    pub jobs_purged: usize,
    /// Idle rate-limit keys dropped
    pub rate_limit_keys_evicted: usize,
}

impl CleanupReport {
    /// Whether the sweep removed anything
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Periodic sweep over the artifact store and the job registry
pub struct CleanupScheduler {
    registry: Arc<JobRegistry>,
    artifacts: Arc<ArtifactStore>,
    rate_limiter: Arc<RateLimiter>,
    event_tx: broadcast::Sender<Event>,
    config: RetentionConfig,
}

impl CleanupScheduler {
    /// Creates a new cleanup scheduler
    pub fn new(
        registry: Arc<JobRegistry>,
        artifacts: Arc<ArtifactStore>,
        rate_limiter: Arc<RateLimiter>,
        event_tx: broadcast::Sender<Event>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            registry,
            artifacts,
            rate_limiter,
            event_tx,
            config,
        }
    }

    /// Run sweeps every `sweep_interval` until `shutdown` is triggered
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            "cleanup scheduler started"
        );
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.sweep_once_at(Utc::now()).await;
                }
            }
        }

        tracing::info!("cleanup scheduler stopped");
    }

    /// Perform one sweep as of `now`
    pub async fn sweep_once_at(&self, now: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();

        for artifact in self.artifacts.sweep_expired_at(now).await {
            report.artifacts_removed += 1;
            report.bytes_freed += artifact.size_bytes;
            self.emit(Event::ArtifactExpired {
                id: artifact.job_id,
                filename: artifact.filename,
            });
        }

        if self.config.sweep_untracked_files {
            match self.artifacts.sweep_untracked_at(now).await {
                Ok(n) => report.untracked_removed = n,
                Err(e) => tracing::warn!(error = %e, "failed to scan download directory"),
            }
        }

        let artifacts = &self.artifacts;
        let purged = self
            .registry
            .purge_finished(now, artifacts.ttl(), |id| artifacts.has_artifacts(id));
        report.jobs_purged = purged.len();
        for id in purged {
            tracing::debug!(job_id = %id, "job record purged");
            self.emit(Event::JobPurged { id });
        }

        report.rate_limit_keys_evicted = self.rate_limiter.evict_idle();

        if report.is_empty() {
            tracing::debug!("cleanup sweep found nothing to remove");
        } else {
            tracing::info!(
                artifacts_removed = report.artifacts_removed,
                bytes_freed = report.bytes_freed,
                untracked_removed = report.untracked_removed,
                jobs_purged = report.jobs_purged,
                rate_limit_keys_evicted = report.rate_limit_keys_evicted,
                "cleanup sweep completed"
            );
        }
        report
    }

    fn emit(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::extractor::OutputFile;
    use crate::registry::Transition;
    use crate::types::{DownloadOptions, FailureKind, JobFailure, JobRequest, Status};
    use std::time::Duration;

    struct Fixture {
        registry: Arc<JobRegistry>,
        artifacts: Arc<ArtifactStore>,
        scheduler: CleanupScheduler,
        events: broadcast::Receiver<Event>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(JobRegistry::new());
        let artifacts = Arc::new(
            ArtifactStore::open(dir.path().join("dl"), Duration::from_secs(60))
                .await
                .unwrap(),
        );
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
        let (event_tx, events) = broadcast::channel(64);
        let config = RetentionConfig {
            artifact_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_millis(20),
            sweep_untracked_files: true,
        };
        let scheduler = CleanupScheduler::new(
            registry.clone(),
            artifacts.clone(),
            limiter,
            event_tx,
            config,
        );
        Fixture {
            registry,
            artifacts,
            scheduler,
            events,
            _dir: dir,
        }
    }

    fn request() -> JobRequest {
        JobRequest::single("https://example.com/v", DownloadOptions::default())
    }

    #[tokio::test]
    async fn completed_job_and_artifact_expire_together() {
        let mut fx = fixture().await;
        let id = fx.registry.create(request());
        fx.registry.try_start(id).unwrap();
        let staging = fx.artifacts.prepare_staging(id).await.unwrap();
        let path = staging.join("v.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();
        let artifact = fx
            .artifacts
            .adopt(id, 1, None, &OutputFile { path, title: None })
            .await
            .unwrap();
        fx.registry
            .transition(id, Transition::Complete(vec![artifact.clone()]))
            .unwrap();

        let report = fx.scheduler.sweep_once_at(Utc::now()).await;
        assert_eq!(report.artifacts_removed, 0);
        assert_eq!(report.jobs_purged, 0);

        let later = Utc::now() + chrono::Duration::seconds(61);
        let report = fx.scheduler.sweep_once_at(later).await;
        assert_eq!(report.artifacts_removed, 1);
        assert_eq!(report.bytes_freed, 4);
        assert_eq!(report.jobs_purged, 1);
        assert!(!artifact.path.exists());
        assert!(!fx.registry.contains(id));

        let mut saw_expired = false;
        let mut saw_purged = false;
        while let Ok(event) = fx.events.try_recv() {
            match event {
                Event::ArtifactExpired { filename, .. } => {
                    saw_expired = filename == artifact.filename
                }
                Event::JobPurged { id: purged } => saw_purged = purged == id,
                _ => {}
            }
        }
        assert!(saw_expired && saw_purged);
    }

    #[tokio::test]
    async fn failed_job_without_artifacts_expires_from_failure_time() {
        let fx = fixture().await;
        let id = fx.registry.create(request());
        fx.registry.try_start(id).unwrap();
        fx.registry
            .transition(
                id,
                Transition::Fail(JobFailure::new(FailureKind::Network, "reset")),
            )
            .unwrap();

        let soon = Utc::now() + chrono::Duration::seconds(30);
        assert_eq!(fx.scheduler.sweep_once_at(soon).await.jobs_purged, 0);
        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(fx.scheduler.sweep_once_at(later).await.jobs_purged, 1);
    }

    #[tokio::test]
    async fn active_jobs_are_never_purged() {
        let fx = fixture().await;
        let pending = fx.registry.create(request());
        let running = fx.registry.create(request());
        fx.registry.try_start(running).unwrap();

        let much_later = Utc::now() + chrono::Duration::days(1);
        fx.scheduler.sweep_once_at(much_later).await;
        assert_eq!(fx.registry.status(pending).unwrap(), Status::Pending);
        assert_eq!(fx.registry.status(running).unwrap(), Status::Processing);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let fx = fixture().await;
        let token = CancellationToken::new();
        let handle = tokio::spawn(fx.scheduler.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "cleanup scheduler should exit on shutdown");
    }
}
