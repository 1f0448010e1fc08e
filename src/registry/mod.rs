//! Job registry
//!
//! Owns every [`JobSnapshot`] the engine tracks and enforces the job state
//! machine. Each job lives behind its own lock, so reads and writes on one job
//! never wait on another job; the map itself is only locked (per shard) for
//! the duration of a lookup.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, JobError, Result};
use crate::types::{
    Artifact, CancelOutcome, ItemResult, JobFailure, JobFilter, JobId, JobPage, JobRequest,
    JobSnapshot, Status,
};

/// A tracked job and its cancellation signal
pub(crate) struct JobEntry {
    /// Admission sequence number, breaks created_at ties in listings
    seq: u64,
    state: RwLock<JobSnapshot>,
    cancel: CancellationToken,
}

impl JobEntry {
    /// Cancellation token observed by the job's worker
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Requested state change for a job
#[derive(Debug)]
pub enum Transition {
    /// Pending -> Processing
    Start,
    /// Processing -> Completed, with the produced artifacts
    Complete(Vec<Artifact>),
    /// Processing -> Failed
    Fail(JobFailure),
    /// Pending/Processing -> Cancelled
    Cancel,
}

impl Transition {
    fn target(&self) -> Status {
        match self {
            Transition::Start => Status::Processing,
            Transition::Complete(_) => Status::Completed,
            Transition::Fail(_) => Status::Failed,
            Transition::Cancel => Status::Cancelled,
        }
    }
}

/// Concurrent map of jobs
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, Arc<JobEntry>>,
    next_seq: AtomicU64,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new pending job for `request`
    pub fn create(&self, request: JobRequest) -> JobId {
        self.create_at(request, Utc::now())
    }

    /// Track a new pending job admitted at `now`
    pub fn create_at(&self, request: JobRequest, now: DateTime<Utc>) -> JobId {
        let id = JobId::new();
        let snapshot = JobSnapshot {
            id,
            kind: request.kind(),
            status: Status::Pending,
            progress: 0,
            title: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            error: None,
            artifacts: Vec::new(),
            items: Vec::new(),
            total_items: None,
            continue_on_error: request
                .is_multi_item()
                .then(|| request.continue_on_error()),
            cancel_requested: false,
            request,
        };
        let entry = Arc::new(JobEntry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            state: RwLock::new(snapshot),
            cancel: CancellationToken::new(),
        });
        self.jobs.insert(id, entry);
        id
    }

    pub(crate) fn entry(&self, id: JobId) -> Result<Arc<JobEntry>> {
        self.jobs
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(Error::Job(JobError::NotFound { id }))
    }

    /// Consistent copy of one job
    pub fn get(&self, id: JobId) -> Result<JobSnapshot> {
        Ok(self.entry(id)?.state.read().clone())
    }

    /// Current status of one job
    pub fn status(&self, id: JobId) -> Result<Status> {
        Ok(self.entry(id)?.state.read().status)
    }

    /// Whether a job with this id is tracked
    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no job is tracked
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Apply a state machine transition
    pub fn transition(&self, id: JobId, transition: Transition) -> Result<JobSnapshot> {
        self.transition_at(id, transition, Utc::now())
    }

    /// Apply a state machine transition at `now`
    ///
    /// Illegal edges are rejected with [`JobError::InvalidTransition`] and leave
    /// the job untouched. Completing without artifacts is an internal error.
    pub fn transition_at(
        &self,
        id: JobId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<JobSnapshot> {
        let entry = self.entry(id)?;
        let mut job = entry.state.write();
        let to = transition.target();
        if !job.status.can_transition_to(to) {
            return Err(Error::Job(JobError::InvalidTransition {
                id,
                from: job.status,
                to,
            }));
        }

        match transition {
            Transition::Start => {
                job.started_at = Some(now);
            }
            Transition::Complete(artifacts) => {
                if artifacts.is_empty() {
                    return Err(Error::Internal(format!(
                        "job {id} cannot complete without artifacts"
                    )));
                }
                job.artifacts = artifacts;
                job.progress = 100;
                job.completed_at = Some(now);
            }
            Transition::Fail(failure) => {
                job.artifacts.clear();
                job.error = Some(failure);
                job.failed_at = Some(now);
            }
            Transition::Cancel => {
                job.artifacts.clear();
                job.cancel_requested = true;
                job.cancelled_at = Some(now);
                entry.cancel.cancel();
            }
        }
        job.status = to;
        Ok(job.clone())
    }

    /// Move a pending job to processing
    ///
    /// Returns `Ok(false)` without changing anything if the job was cancelled
    /// while it waited for a slot.
    pub fn try_start(&self, id: JobId) -> Result<bool> {
        match self.transition(id, Transition::Start) {
            Ok(_) => Ok(true),
            Err(Error::Job(JobError::InvalidTransition {
                from: Status::Cancelled,
                ..
            })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Terminate a processing job as failed, whatever the worker thinks
    ///
    /// Used when the worker hit a fault that left the job in an unknown state.
    /// Jobs already terminal are left alone.
    pub fn force_fail(&self, id: JobId, failure: JobFailure) -> Result<JobSnapshot> {
        let entry = self.entry(id)?;
        let mut job = entry.state.write();
        if job.status.is_terminal() {
            return Ok(job.clone());
        }
        let now = Utc::now();
        if job.started_at.is_none() {
            job.started_at = Some(now);
        }
        job.status = Status::Failed;
        job.artifacts.clear();
        job.error = Some(failure);
        job.failed_at = Some(now);
        entry.cancel.cancel();
        Ok(job.clone())
    }

    /// Handle a cancel request
    ///
    /// Pending jobs go straight to cancelled. Processing jobs are flagged and
    /// their token is triggered; the worker finishes the transition once it
    /// reaches a checkpoint.
    pub fn request_cancel(&self, id: JobId) -> Result<CancelOutcome> {
        let entry = self.entry(id)?;
        let mut job = entry.state.write();
        if !job.status.is_cancelable() {
            return Err(Error::Job(JobError::NotCancelable {
                id,
                status: job.status,
            }));
        }
        match job.status {
            Status::Pending => {
                job.status = Status::Cancelled;
                job.cancel_requested = true;
                job.cancelled_at = Some(Utc::now());
                entry.cancel.cancel();
                Ok(CancelOutcome::Cancelled)
            }
            Status::Processing => {
                job.cancel_requested = true;
                entry.cancel.cancel();
                Ok(CancelOutcome::Requested)
            }
            status => Err(Error::Job(JobError::InvalidTransition {
                id,
                from: status,
                to: Status::Cancelled,
            })),
        }
    }

    /// Raise the progress of a processing job
    ///
    /// Progress never decreases and stays below 100 until completion.
    /// Returns the new value if it changed.
    pub fn update_progress(&self, id: JobId, percent: u8) -> Option<u8> {
        let entry = self.entry(id).ok()?;
        let mut job = entry.state.write();
        let percent = percent.min(99);
        if job.status != Status::Processing || percent <= job.progress {
            return None;
        }
        job.progress = percent;
        Some(percent)
    }

    /// Record the title of the job's media or playlist
    pub fn set_title(&self, id: JobId, title: Option<String>) -> Result<()> {
        let entry = self.entry(id)?;
        let mut job = entry.state.write();
        if title.is_some() {
            job.title = title;
        }
        Ok(())
    }

    /// Record how many items the job will attempt
    pub fn set_total_items(&self, id: JobId, total: usize) -> Result<()> {
        let entry = self.entry(id)?;
        entry.state.write().total_items = Some(total);
        Ok(())
    }

    /// Append a per-item result
    pub fn record_item(&self, id: JobId, item: ItemResult) -> Result<()> {
        let entry = self.entry(id)?;
        entry.state.write().items.push(item);
        Ok(())
    }

    /// Stop tracking a job
    pub fn remove(&self, id: JobId) -> Option<JobSnapshot> {
        self.jobs
            .remove(&id)
            .map(|(_, entry)| entry.state.read().clone())
    }

    /// Snapshot every job, newest first
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let mut entries: Vec<Arc<JobEntry>> =
            self.jobs.iter().map(|e| Arc::clone(e.value())).collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries.iter().map(|e| e.state.read().clone()).collect()
    }

    /// Filtered, paginated listing, newest first
    pub fn list(&self, filter: &JobFilter) -> JobPage {
        let matching: Vec<JobSnapshot> = self
            .snapshots()
            .into_iter()
            .filter(|job| filter.status.is_none_or(|s| job.status == s))
            .filter(|job| filter.kind.is_none_or(|k| job.kind == k))
            .collect();
        let total = matching.len();
        let jobs = matching
            .iter()
            .skip(filter.skip)
            .take(filter.limit)
            .map(JobSnapshot::summary)
            .collect();
        JobPage {
            total,
            skip: filter.skip,
            limit: filter.limit,
            jobs,
        }
    }

    /// Number of jobs in `status`
    pub fn count(&self, status: Status) -> usize {
        self.jobs
            .iter()
            .filter(|e| e.value().state.read().status == status)
            .count()
    }

    /// Ids of jobs that are not terminal
    pub fn active_ids(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|e| !e.value().state.read().status.is_terminal())
            .map(|e| *e.key())
            .collect()
    }

    /// Remove terminal jobs that finished at least `retention` ago and for
    /// which `keep` returns false
    pub fn purge_finished(
        &self,
        now: DateTime<Utc>,
        retention: chrono::Duration,
        keep: impl Fn(JobId) -> bool,
    ) -> Vec<JobId> {
        let expired: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|e| {
                e.value()
                    .state
                    .read()
                    .terminal_at()
                    .and_then(|at| at.checked_add_signed(retention))
                    .is_some_and(|until| until <= now)
            })
            .map(|e| *e.key())
            .collect();

        expired
            .into_iter()
            .filter(|id| !keep(*id))
            .filter(|id| self.jobs.remove(id).is_some())
            .collect()
    }
}
