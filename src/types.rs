//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};

/// Unique identifier for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Allocate a fresh random job id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short prefix used in artifact filenames (first 8 hex chars)
    pub fn prefix(&self) -> String {
        let simple = self.0.simple().to_string();
        simple[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job status
///
/// Legal edges: `Pending -> Processing -> {Completed, Failed, Cancelled}` and
/// `Pending -> Cancelled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Admitted and waiting for a worker slot
    Pending,
    /// Running on a worker
    Processing,
    /// Finished with at least one artifact
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped on request
    Cancelled,
}

impl Status {
    /// All statuses, in state machine order
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::Processing,
        Status::Completed,
        Status::Failed,
        Status::Cancelled,
    ];

    /// Lowercase name used in logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Failed | Status::Cancelled
        )
    }

    /// Whether a cancel request is accepted in this state
    pub fn is_cancelable(&self) -> bool {
        matches!(self, Status::Pending | Status::Processing)
    }

    /// Whether `self -> next` is an edge of the job state machine
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Processing)
                | (Status::Pending, Status::Cancelled)
                | (Status::Processing, Status::Completed)
                | (Status::Processing, Status::Failed)
                | (Status::Processing, Status::Cancelled)
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported platforms for platform-specific requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Instagram posts, reels, stories and carousels
    Instagram,
}

/// Kind of content addressed by a platform item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Single post (image or video)
    Post,
    /// Short-form video
    Reel,
    /// All active stories of a user (target is a username)
    Story,
    /// Multi-media post
    Carousel,
}

impl Platform {
    /// Resolve a user supplied target (URL, shortcode or username) into a URL
    pub fn resolve_url(&self, target: &str, content: ContentType) -> String {
        let target = target.trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        match (self, content) {
            (Platform::Instagram, ContentType::Reel) => {
                format!("https://www.instagram.com/reel/{}/", target.trim_matches('/'))
            }
            (Platform::Instagram, ContentType::Story) => format!(
                "https://www.instagram.com/stories/{}/",
                target.trim_start_matches('@').trim_matches('/')
            ),
            (Platform::Instagram, ContentType::Post | ContentType::Carousel) => {
                format!("https://www.instagram.com/p/{}/", target.trim_matches('/'))
            }
        }
    }
}

/// One entry of a platform request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformItem {
    /// URL, shortcode or username
    pub target: String,
    /// What the target refers to
    pub content: ContentType,
}

/// Requested quality
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Best available video and audio
    #[default]
    Best,
    /// Smallest available
    Worst,
    /// Audio track only
    AudioOnly,
    /// Up to 720p
    #[serde(rename = "720p")]
    P720,
    /// Up to 1080p
    #[serde(rename = "1080p")]
    P1080,
    /// Up to 1440p
    #[serde(rename = "1440p")]
    P1440,
    /// Up to 2160p
    #[serde(rename = "4k")]
    P2160,
}

impl Quality {
    fn max_height(&self) -> Option<u32> {
        match self {
            Quality::P720 => Some(720),
            Quality::P1080 => Some(1080),
            Quality::P1440 => Some(1440),
            Quality::P2160 => Some(2160),
            _ => None,
        }
    }
}

/// Requested output type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Muxed video
    #[default]
    Video,
    /// Audio only
    Audio,
    /// Video and audio
    Both,
}

/// Audio container preference
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Whatever the source offers
    #[default]
    Best,
    /// Transcode to MP3
    Mp3,
    /// Transcode to M4A
    M4a,
}

/// Format hints forwarded to the extraction collaborator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Quality preference
    #[serde(default)]
    pub quality: Quality,
    /// Output type
    #[serde(default)]
    pub output: OutputType,
    /// Audio format
    #[serde(default)]
    pub audio_format: AudioFormat,
    /// Explicit collaborator format id (overrides quality)
    #[serde(default)]
    pub format_id: Option<String>,
    /// Ask the collaborator to emit a metadata sidecar
    #[serde(default)]
    pub include_metadata: bool,
    /// Content type for platform items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentType>,
}

impl DownloadOptions {
    /// Options with the given quality and defaults elsewhere
    pub fn with_quality(quality: Quality) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    /// Whether only an audio track is wanted
    pub fn is_audio_only(&self) -> bool {
        self.quality == Quality::AudioOnly
            || self.output == OutputType::Audio
            || self.audio_format != AudioFormat::Best
    }

    /// Format selector string understood by the collaborator
    pub fn format_selector(&self) -> String {
        if let Some(format_id) = &self.format_id {
            return format_id.clone();
        }
        if self.is_audio_only() {
            return "bestaudio/best".to_string();
        }
        match (self.quality, self.quality.max_height()) {
            (_, Some(h)) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
            (Quality::Worst, None) => "worstvideo+worstaudio/worst".to_string(),
            _ => "bestvideo+bestaudio/best".to_string(),
        }
    }
}

fn default_continue_on_error() -> bool {
    true
}

/// A download request as admitted from the API layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobRequest {
    /// One URL
    Single {
        /// Media URL
        url: String,
        /// Format hints
        #[serde(default)]
        options: DownloadOptions,
    },
    /// Several independent URLs
    Batch {
        /// Media URLs, processed in index order
        urls: Vec<String>,
        /// Format hints applied to every item
        #[serde(default)]
        options: DownloadOptions,
        /// Keep going after an item fails
        #[serde(default = "default_continue_on_error")]
        continue_on_error: bool,
    },
    /// Every entry of a playlist
    PlaylistAll {
        /// Playlist URL
        url: String,
        /// Format hints applied to every entry
        #[serde(default)]
        options: DownloadOptions,
    },
    /// Selected entries of a playlist
    PlaylistSelect {
        /// Playlist URL
        url: String,
        /// Zero-based entry indices; out-of-range indices are ignored
        indices: Vec<usize>,
        /// Format hints applied to every entry
        #[serde(default)]
        options: DownloadOptions,
    },
    /// Platform-specific content (one or more items)
    Platform {
        /// Target platform
        platform: Platform,
        /// Items to fetch
        items: Vec<PlatformItem>,
        /// Format hints applied to every item
        #[serde(default)]
        options: DownloadOptions,
        /// Keep going after an item fails
        #[serde(default = "default_continue_on_error")]
        continue_on_error: bool,
    },
}

impl JobRequest {
    /// Single-URL request with the given options
    pub fn single(url: impl Into<String>, options: DownloadOptions) -> Self {
        Self::Single {
            url: url.into(),
            options,
        }
    }

    /// Batch request
    pub fn batch(urls: Vec<String>, options: DownloadOptions, continue_on_error: bool) -> Self {
        Self::Batch {
            urls,
            options,
            continue_on_error,
        }
    }

    /// The job kind this request creates
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Single { .. } => JobKind::Single,
            JobRequest::Batch { .. } => JobKind::Batch,
            JobRequest::PlaylistAll { .. } => JobKind::PlaylistAll,
            JobRequest::PlaylistSelect { .. } => JobKind::PlaylistSelect,
            JobRequest::Platform { platform, .. } => JobKind::Platform(*platform),
        }
    }

    /// Format hints of the request
    pub fn options(&self) -> &DownloadOptions {
        match self {
            JobRequest::Single { options, .. }
            | JobRequest::Batch { options, .. }
            | JobRequest::PlaylistAll { options, .. }
            | JobRequest::PlaylistSelect { options, .. }
            | JobRequest::Platform { options, .. } => options,
        }
    }

    /// Whether the job tracks per-item sub-results
    pub fn is_multi_item(&self) -> bool {
        match self {
            JobRequest::Single { .. } => false,
            JobRequest::Platform { items, .. } => items.len() > 1,
            _ => true,
        }
    }

    /// Whether a failed item should not abort the remaining items
    pub fn continue_on_error(&self) -> bool {
        match self {
            JobRequest::Single { .. } => false,
            JobRequest::Batch {
                continue_on_error, ..
            }
            | JobRequest::Platform {
                continue_on_error, ..
            } => *continue_on_error,
            JobRequest::PlaylistAll { .. } | JobRequest::PlaylistSelect { .. } => true,
        }
    }

    /// Check the request before a job is created
    pub fn validate(&self, limits: &DownloadConfig) -> Result<()> {
        match self {
            JobRequest::Single { url, .. }
            | JobRequest::PlaylistAll { url, .. } => validate_url(url),
            JobRequest::PlaylistSelect { url, indices, .. } => {
                if indices.is_empty() {
                    return Err(Error::Validation(
                        "at least one playlist index must be selected".to_string(),
                    ));
                }
                validate_url(url)
            }
            JobRequest::Batch { urls, .. } => {
                validate_item_count(urls.len(), limits.max_batch_items)?;
                urls.iter().try_for_each(|u| validate_url(u))
            }
            JobRequest::Platform {
                platform, items, ..
            } => {
                validate_item_count(items.len(), limits.max_batch_items)?;
                items.iter().try_for_each(|item| {
                    if item.target.trim().is_empty() {
                        return Err(Error::Validation(
                            "platform target must not be empty".to_string(),
                        ));
                    }
                    validate_url(&platform.resolve_url(&item.target, item.content))
                })
            }
        }
    }
}

fn validate_item_count(count: usize, max: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::Validation(
            "at least one item must be provided".to_string(),
        ));
    }
    if count > max {
        return Err(Error::Validation(format!(
            "maximum {max} items per request, got {count}"
        )));
    }
    Ok(())
}

fn validate_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| Error::Validation(format!("invalid URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        scheme => Err(Error::Validation(format!(
            "unsupported URL '{raw}' (scheme {scheme})"
        ))),
    }
}

/// Job kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// One URL
    Single,
    /// Several URLs
    Batch,
    /// Whole playlist
    PlaylistAll,
    /// Selected playlist entries
    PlaylistSelect,
    /// Platform-specific variant
    Platform(Platform),
}

/// Classification of a failure, stored on failed jobs and items
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connectivity or transfer failure
    Network,
    /// URL or site not supported by the collaborator
    Unsupported,
    /// Private or restricted content
    Forbidden,
    /// Content does not exist
    NotFound,
    /// Job exceeded the configured timeout
    Timeout,
    /// Stopped by a cancel request
    Cancelled,
    /// Anything else, including broken invariants
    Internal,
}

impl FailureKind {
    /// Lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Forbidden => "forbidden",
            FailureKind::NotFound => "not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error stored on a failed job or item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
}

impl JobFailure {
    /// Build a failure
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one item of a multi-item job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Produced at least one artifact
    Succeeded,
    /// Collaborator failed for this item
    Failed,
}

/// Per-item result of a batch, playlist or platform job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Position of the item in the request (playlist entry index for playlists)
    pub index: usize,
    /// Resolved item URL
    pub url: String,
    /// Title reported for the item, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Outcome
    pub status: ItemStatus,
    /// Error, present iff `status == Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    /// Artifact filenames produced by this item
    #[serde(default)]
    pub files: Vec<String>,
}

/// An output file registered with the artifact store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Collision-free filename; the retrieval reference
    pub filename: String,
    /// Storage path
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Owning job
    pub job_id: JobId,
    /// Item that produced the file (multi-item jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
    /// Media title, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// End of the retrieval window (exclusive)
    pub expires_at: DateTime<Utc>,
}

impl Artifact {
    /// Whether the artifact may be served at `now`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now && now < self.expires_at
    }
}

/// Point-in-time copy of a job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job id
    pub id: JobId,
    /// Job kind
    pub kind: JobKind,
    /// Current status
    pub status: Status,
    /// Progress percentage, 0-100
    pub progress: u8,
    /// Original request parameters
    pub request: JobRequest,
    /// Media or playlist title, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Admission time
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    /// When the job was cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Error, present iff `status == Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    /// Produced artifacts, non-empty iff `status == Completed`
    pub artifacts: Vec<Artifact>,
    /// Per-item results for multi-item jobs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemResult>,
    /// Number of items the job will attempt, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
    /// Continue-on-error flag for multi-item jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
    /// A cancel request has been received
    pub cancel_requested: bool,
}

impl JobSnapshot {
    /// Time the job reached a terminal state
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            Status::Completed => self.completed_at,
            Status::Failed => self.failed_at,
            Status::Cancelled => self.cancelled_at,
            Status::Pending | Status::Processing => None,
        }
    }

    /// Number of successful items
    pub fn succeeded_items(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Succeeded)
            .count()
    }

    /// Number of failed items
    pub fn failed_items(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Failed)
            .count()
    }

    /// Compact listing view
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            kind: self.kind,
            status: self.status,
            progress: self.progress,
            title: self.title.clone(),
            created_at: self.created_at,
            files_count: self.artifacts.len(),
            error_count: self.failed_items() + usize::from(self.error.is_some()),
            total_items: self.total_items,
            completed_items: self.succeeded_items(),
        }
    }
}

/// Compact job view for listings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job id
    pub id: JobId,
    /// Job kind
    pub kind: JobKind,
    /// Current status
    pub status: Status,
    /// Progress percentage
    pub progress: u8,
    /// Title, once known
    pub title: Option<String>,
    /// Admission time
    pub created_at: DateTime<Utc>,
    /// Number of artifacts
    pub files_count: usize,
    /// Number of recorded errors (job + items)
    pub error_count: usize,
    /// Items the job will attempt, once known
    pub total_items: Option<usize>,
    /// Items that succeeded
    pub completed_items: usize,
}

/// Filter and pagination for job listings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobFilter {
    /// Only jobs in this status
    #[serde(default)]
    pub status: Option<Status>,
    /// Only jobs of this kind
    #[serde(default)]
    pub kind: Option<JobKind>,
    /// Number of jobs to skip
    #[serde(default)]
    pub skip: usize,
    /// Maximum number of jobs returned
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    10
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            kind: None,
            skip: 0,
            limit: default_list_limit(),
        }
    }
}

/// A page of job summaries, newest first
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobPage {
    /// Number of jobs matching the filter
    pub total: usize,
    /// Applied skip
    pub skip: usize,
    /// Applied limit
    pub limit: usize,
    /// The page
    pub jobs: Vec<JobSummary>,
}

/// Result of a cancel request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The job was pending and is now cancelled
    Cancelled,
    /// The job is running; the worker will stop at its next checkpoint
    Requested,
}

/// Engine statistics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Jobs waiting for a worker
    pub pending: usize,
    /// Jobs running
    pub processing: usize,
    /// Completed jobs still tracked
    pub completed: usize,
    /// Failed jobs still tracked
    pub failed: usize,
    /// Cancelled jobs still tracked
    pub cancelled: usize,
    /// Jobs in the admission queue
    pub queued: usize,
    /// Configured worker slots
    pub max_concurrent_jobs: usize,
    /// Live artifacts
    pub artifacts: usize,
    /// Bytes held by live artifacts
    pub storage_bytes: u64,
    /// Seconds since the engine was created
    pub uptime_secs: i64,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job admitted and queued
    Queued {
        /// Job id
        id: JobId,
        /// Job kind
        kind: JobKind,
    },
    /// Worker picked the job up
    Started {
        /// Job id
        id: JobId,
    },
    /// Progress changed
    Progress {
        /// Job id
        id: JobId,
        /// New progress percentage
        percent: u8,
    },
    /// One item of a multi-item job finished
    ItemFinished {
        /// Job id
        id: JobId,
        /// Item index
        index: usize,
        /// Item outcome
        status: ItemStatus,
    },
    /// Job completed
    Completed {
        /// Job id
        id: JobId,
        /// Artifact filenames
        files: Vec<String>,
    },
    /// Job failed
    Failed {
        /// Job id
        id: JobId,
        /// Failure
        error: JobFailure,
    },
    /// Job cancelled
    Cancelled {
        /// Job id
        id: JobId,
    },
    /// Artifact removed by the cleanup sweep
    ArtifactExpired {
        /// Owning job
        id: JobId,
        /// Removed filename
        filename: String,
    },
    /// Job record purged from the registry
    JobPurged {
        /// Job id
        id: JobId,
    },
    /// Engine shutting down
    Shutdown,
}
