//! Background service starters: queue processor and cleanup scheduler.

use std::sync::Arc;

use crate::cleanup::CleanupScheduler;

use super::MediaDownloader;

/// Handles of the engine's background tasks
///
/// Both tasks stop on their own once [`MediaDownloader::shutdown`] completes.
pub struct BackgroundTasks {
    /// Worker pool dispatcher
    pub queue_processor: tokio::task::JoinHandle<()>,
    /// Periodic artifact and job cleanup
    pub cleanup: tokio::task::JoinHandle<()>,
}

impl MediaDownloader {
    /// Start every background task the engine needs
    pub fn start(&self) -> BackgroundTasks {
        BackgroundTasks {
            queue_processor: self.start_queue_processor(),
            cleanup: self.start_cleanup_scheduler(),
        }
    }

    /// Start the periodic cleanup sweep
    pub fn start_cleanup_scheduler(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.cleanup_scheduler();
        let shutdown = self.shutdown_token.clone();

        let handle = tokio::spawn(async move {
            scheduler.run(shutdown).await;
        });

        tracing::info!("cleanup scheduler background task started");

        handle
    }

    /// Cleanup scheduler bound to this engine's registry and store
    pub fn cleanup_scheduler(&self) -> CleanupScheduler {
        CleanupScheduler::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.artifacts),
            Arc::clone(&self.rate_limiter),
            self.event_tx.clone(),
            self.config.retention.clone(),
        )
    }
}
