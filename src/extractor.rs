//! Media extraction collaborator
//!
//! The engine never talks to media sites itself. Metadata lookup and the
//! actual transfer are delegated to a [`MediaExtractor`] implementation
//! supplied by the embedding application. Progress flows back through a
//! [`ProgressHandle`], which doubles as the job's cancellation checkpoint.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::types::{DownloadOptions, FailureKind, JobFailure};

/// Error returned by a collaborator
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExtractorError {
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
}

impl ExtractorError {
    /// Build an error of the given kind
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connectivity or transfer failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    /// URL not handled by the collaborator
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, message)
    }

    /// Private or restricted content
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Forbidden, message)
    }

    /// Content does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    /// Unexpected collaborator fault
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }
}

impl From<Cancelled> for ExtractorError {
    fn from(_: Cancelled) -> Self {
        Self::new(FailureKind::Cancelled, "cancelled")
    }
}

impl From<std::io::Error> for ExtractorError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<ExtractorError> for Error {
    fn from(e: ExtractorError) -> Self {
        match e.kind {
            FailureKind::Forbidden => Error::Forbidden(e.message),
            FailureKind::NotFound => Error::NotFound(e.message),
            FailureKind::Cancelled => Error::Cancelled,
            FailureKind::Timeout => Error::Timeout(e.message),
            FailureKind::Internal => Error::Internal(e.message),
            FailureKind::Network | FailureKind::Unsupported => Error::Extraction(e.message),
        }
    }
}

impl From<ExtractorError> for JobFailure {
    fn from(e: ExtractorError) -> Self {
        JobFailure::new(e.kind, e.message)
    }
}

/// Marker returned by a checkpoint once cancellation was requested
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

/// One entry of a playlist
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Entry URL
    pub url: String,
    /// Entry title, if listed
    #[serde(default)]
    pub title: Option<String>,
}

/// Metadata about a URL as reported by the collaborator
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Site-specific media id
    #[serde(default)]
    pub id: Option<String>,
    /// Title of the media or playlist
    #[serde(default)]
    pub title: Option<String>,
    /// Uploader or channel
    #[serde(default)]
    pub uploader: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration_secs: Option<f64>,
    /// Thumbnail URL
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Playlist entries; empty for single media
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,
    /// Formats the collaborator can deliver; ids are valid `format_id` options
    #[serde(default)]
    pub formats: Vec<MediaFormat>,
}

impl MediaMetadata {
    /// Whether the URL is a playlist
    pub fn is_playlist(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Available formats split by the streams they carry
    pub fn format_groups(&self) -> FormatGroups {
        let mut groups = FormatGroups::default();
        for format in &self.formats {
            match (format.has_video(), format.has_audio()) {
                (true, true) => groups.combined.push(format.clone()),
                (true, false) => groups.video_only.push(format.clone()),
                (false, true) => groups.audio_only.push(format.clone()),
                // storyboards and similar
                (false, false) => {}
            }
        }
        groups
    }
}

/// One downloadable format of a media item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    /// Collaborator format id, usable as [`DownloadOptions::format_id`]
    pub format_id: String,
    /// Container extension
    #[serde(default)]
    pub ext: Option<String>,
    /// Resolution label such as `1280x720` or `audio only`
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
    /// Video codec; `none` or absent for audio-only formats
    #[serde(default)]
    pub vcodec: Option<String>,
    /// Audio codec; `none` or absent for video-only formats
    #[serde(default)]
    pub acodec: Option<String>,
    /// Exact or approximate size in bytes
    #[serde(default)]
    pub filesize: Option<u64>,
}

impl MediaFormat {
    /// Whether the format carries a video stream
    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    /// Whether the format carries an audio stream
    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    codec.is_some_and(|c| !c.is_empty() && c != "none")
}

/// Formats grouped by stream content
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatGroups {
    pub video_only: Vec<MediaFormat>,
    pub audio_only: Vec<MediaFormat>,
    /// Formats with both video and audio
    pub combined: Vec<MediaFormat>,
}

/// What the executor asks the collaborator to fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Media URL
    pub url: String,
    /// Format hints
    pub options: DownloadOptions,
    /// Format selector derived from the options
    pub format: String,
    /// Private directory to write output files into
    pub work_dir: PathBuf,
}

/// A file written by the collaborator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    /// Where the collaborator wrote it (inside the work dir)
    pub path: PathBuf,
    /// Media title, used for the artifact filename
    pub title: Option<String>,
}

/// Media extraction collaborator
///
/// Implementations must write only inside [`DownloadRequest::work_dir`] and
/// should call [`ProgressHandle::report`] regularly; a returned `Err(Cancelled)`
/// from it means the job was cancelled and the download should stop.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Look up metadata (and playlist entries) without downloading
    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata, ExtractorError>;

    /// Download one media item, returning the files written
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressHandle,
    ) -> Result<Vec<OutputFile>, ExtractorError>;
}

type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

struct Throttle {
    last_percent: u8,
    last_emit: Instant,
}

/// Progress reporting and cancellation checkpoint for one item
///
/// Reports are throttled: a value is forwarded only if it rose by at least the
/// configured delta or the configured interval has passed since the last
/// forwarded value. Values never go down.
pub struct ProgressHandle {
    cancel: CancellationToken,
    sink: ProgressSink,
    throttle: Mutex<Throttle>,
    min_delta: u8,
    min_interval: Duration,
}

impl ProgressHandle {
    /// Handle forwarding throttled percentages to `sink`
    pub fn new(
        cancel: CancellationToken,
        min_delta: u8,
        min_interval: Duration,
        sink: impl Fn(u8) + Send + Sync + 'static,
    ) -> Self {
        Self {
            cancel,
            sink: Arc::new(sink),
            throttle: Mutex::new(Throttle {
                last_percent: 0,
                last_emit: Instant::now(),
            }),
            min_delta: min_delta.max(1),
            min_interval,
        }
    }

    /// Report transferred bytes; `total` may be unknown
    pub fn report(&self, downloaded: u64, total: Option<u64>) -> Result<(), Cancelled> {
        match total {
            Some(total) if total > 0 => {
                let percent = (u128::from(downloaded.min(total)) * 100 / u128::from(total)) as u8;
                self.report_percent(percent)
            }
            _ => self.checkpoint(),
        }
    }

    /// Report progress of the current item as a percentage
    pub fn report_percent(&self, percent: u8) -> Result<(), Cancelled> {
        self.checkpoint()?;
        let percent = percent.min(100);
        let now = Instant::now();
        let forward = {
            let mut t = self.throttle.lock();
            let rose = percent > t.last_percent;
            let due = percent >= t.last_percent.saturating_add(self.min_delta)
                || now.duration_since(t.last_emit) >= self.min_interval;
            if rose && due {
                t.last_percent = percent;
                t.last_emit = now;
                true
            } else {
                false
            }
        };
        if forward {
            (self.sink)(percent);
        }
        Ok(())
    }

    /// Cancellation checkpoint
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
