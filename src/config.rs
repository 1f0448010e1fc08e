//! Configuration types for media-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Job execution configuration (directories, concurrency, limits)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory holding finished artifacts (default: "./tmp/downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum jobs in the processing state at once (default: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// Wall-clock limit for a single job, measured from start of processing
    /// (None = unlimited)
    #[serde(default)]
    pub job_timeout: Option<Duration>,

    /// Smallest progress increase (percentage points) that is published (default: 1)
    #[serde(default = "default_progress_min_delta")]
    pub progress_min_delta: u8,

    /// Longest interval without publishing a progress increase (default: 1s)
    #[serde(default = "default_progress_min_interval")]
    pub progress_min_interval: Duration,

    /// Time a cancelled worker gets to reach a checkpoint before it is abandoned (default: 5s)
    #[serde(default = "default_cancel_grace_period")]
    pub cancel_grace_period: Duration,

    /// Maximum items in a batch or platform request (default: 20)
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,

    /// Maximum entries fetched from one playlist (None = unlimited)
    #[serde(default)]
    pub max_playlist_items: Option<usize>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_jobs: default_max_concurrent(),
            job_timeout: None,
            progress_min_delta: default_progress_min_delta(),
            progress_min_interval: default_progress_min_interval(),
            cancel_grace_period: default_cancel_grace_period(),
            max_batch_items: default_max_batch_items(),
            max_playlist_items: None,
        }
    }
}

/// Artifact retention and cleanup configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How long an artifact stays retrievable after registration (default: 30 minutes)
    #[serde(default = "default_artifact_ttl")]
    pub artifact_ttl: Duration,

    /// Period of the cleanup sweep (default: 60s)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,

    /// Also delete files in the download directory that no artifact tracks,
    /// once they are older than the TTL (default: true)
    #[serde(default = "default_true")]
    pub sweep_untracked_files: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            artifact_ttl: default_artifact_ttl(),
            sweep_interval: default_sweep_interval(),
            sweep_untracked_files: true,
        }
    }
}

/// Per-client rate limiting configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests admitted per client key per window (default: 30)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length (default: 60s)
    #[serde(default = "default_window")]
    pub window: Duration,

    /// Client keys never limited (e.g., "127.0.0.1")
    #[serde(default)]
    pub exempt_keys: Vec<String>,

    /// Idle time after which a client's window state is dropped (default: 10 minutes)
    #[serde(default = "default_idle_eviction")]
    pub idle_eviction: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window: default_window(),
            exempt_keys: Vec::new(),
            idle_eviction: default_idle_eviction(),
        }
    }
}

/// Main configuration for MediaDownloader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Job execution settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Artifact retention settings
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Rate limiting settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_jobs == 0 {
            return Err(config_error(
                "max_concurrent_jobs",
                "must be at least 1",
            ));
        }
        if self.download.max_concurrent_jobs > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(config_error("max_concurrent_jobs", "is too large"));
        }
        if self.download.max_batch_items == 0 {
            return Err(config_error("max_batch_items", "must be at least 1"));
        }
        if self.download.progress_min_delta == 0 || self.download.progress_min_delta > 100 {
            return Err(config_error(
                "progress_min_delta",
                "must be between 1 and 100",
            ));
        }
        if self.download.job_timeout.is_some_and(|t| t.is_zero()) {
            return Err(config_error("job_timeout", "must be greater than zero"));
        }
        if self.download.max_playlist_items == Some(0) {
            return Err(config_error("max_playlist_items", "must be at least 1"));
        }
        if self.retention.artifact_ttl.is_zero() {
            return Err(config_error("artifact_ttl", "must be greater than zero"));
        }
        // expiry timestamps are computed as `now + ttl`
        let ttl_in_range = chrono::Duration::from_std(self.retention.artifact_ttl)
            .ok()
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .is_some();
        if !ttl_in_range {
            return Err(config_error("artifact_ttl", "is out of range"));
        }
        if self.retention.sweep_interval.is_zero() {
            return Err(config_error("sweep_interval", "must be greater than zero"));
        }
        if self.rate_limit.enabled {
            if self.rate_limit.max_requests == 0 {
                return Err(config_error("max_requests", "must be at least 1"));
            }
            if self.rate_limit.window.is_zero() {
                return Err(config_error("window", "must be greater than zero"));
            }
        }
        Ok(())
    }
}

fn config_error(key: &str, message: &str) -> Error {
    Error::Config {
        message: format!("{key} {message}"),
        key: Some(key.to_string()),
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./tmp/downloads")
}

fn default_max_concurrent() -> usize {
    10
}

fn default_progress_min_delta() -> u8 {
    1
}

fn default_progress_min_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_cancel_grace_period() -> Duration {
    Duration::from_secs(5)
}

fn default_max_batch_items() -> usize {
    20
}

fn default_artifact_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

fn default_max_requests() -> u32 {
    30
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn default_idle_eviction() -> Duration {
    Duration::from_secs(10 * 60)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.download.max_concurrent_jobs, 10);
        assert_eq!(config.retention.artifact_ttl, Duration::from_secs(1800));
        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config.download.max_batch_items, 20);
        assert!(config.rate_limit.enabled);
        assert!(config.retention.sweep_untracked_files);
        assert_eq!(config.download_dir(), &PathBuf::from("./tmp/downloads"));
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let config: Config = serde_json::from_str(
            r#"{"download": {"max_concurrent_jobs": 2}, "rate_limit": {"exempt_keys": ["127.0.0.1"]}}"#,
        )
        .expect("deserialize failed");
        assert_eq!(config.download.max_concurrent_jobs, 2);
        assert_eq!(config.download.max_batch_items, 20);
        assert_eq!(config.rate_limit.exempt_keys, vec!["127.0.0.1".to_string()]);
        assert_eq!(config.rate_limit.max_requests, 30);
    }

    #[test]
    fn zero_concurrency_is_a_config_error_naming_the_key() {
        let mut config = Config::default();
        config.download.max_concurrent_jobs = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_concurrent_jobs"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_ttl_and_timeout_rejected() {
        let mut config = Config::default();
        config.retention.artifact_ttl = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.job_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_that_overflow_at_runtime_are_rejected() {
        let mut config = Config::default();
        config.retention.artifact_ttl = Duration::from_secs(10_u64.pow(13));
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("artifact_ttl")),
            other => panic!("expected config error, got {other:?}"),
        }

        let mut config = Config::default();
        config.download.max_concurrent_jobs = usize::MAX;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_concurrent_jobs"))
            }
            other => panic!("expected config error, got {other:?}"),
        }

        let mut config = Config::default();
        config.download.max_concurrent_jobs = tokio::sync::Semaphore::MAX_PERMITS;
        config.retention.artifact_ttl = Duration::from_secs(365 * 24 * 3600);
        config.validate().unwrap();
    }

    #[test]
    fn disabled_rate_limit_skips_its_checks() {
        let mut config = Config::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        config.validate().unwrap();
    }
}
