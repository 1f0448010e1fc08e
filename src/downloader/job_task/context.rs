//! Job task context: shared state and progress publishing.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::extractor::{MediaExtractor, ProgressHandle};
use crate::registry::JobRegistry;
use crate::types::{Event, JobId, JobRequest};

/// Shared context for a single job task, reducing parameter passing between helpers.
pub(crate) struct JobTaskContext {
    pub(crate) id: JobId,
    pub(crate) request: JobRequest,
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) artifacts: Arc<ArtifactStore>,
    pub(crate) extractor: Arc<dyn MediaExtractor>,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    pub(crate) cancel_token: CancellationToken,
}

impl JobTaskContext {
    /// Remove this job from the active jobs map.
    pub(super) async fn remove_from_active(&self) {
        self.active_jobs.lock().await.remove(&self.id);
    }

    pub(super) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(super) fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Raise job progress and publish the change
    pub(super) fn publish_progress(&self, percent: u8) {
        publish(&self.registry, &self.event_tx, self.id, percent);
    }

    /// Progress handle for item `position` of `total`
    ///
    /// The item's 0-100 is scaled into its share of the job's range.
    pub(super) fn progress_handle(&self, position: usize, total: usize) -> ProgressHandle {
        let registry = Arc::clone(&self.registry);
        let event_tx = self.event_tx.clone();
        let id = self.id;
        let total = total.max(1);
        ProgressHandle::new(
            self.cancel_token.clone(),
            self.config.download.progress_min_delta,
            self.config.download.progress_min_interval,
            move |item_percent| {
                let overall = (position * 100 + usize::from(item_percent)) / total;
                publish(&registry, &event_tx, id, overall.min(100) as u8);
            },
        )
    }
}

fn publish(registry: &JobRegistry, event_tx: &broadcast::Sender<Event>, id: JobId, percent: u8) {
    if let Some(percent) = registry.update_progress(id, percent) {
        event_tx.send(Event::Progress { id, percent }).ok();
    }
}
