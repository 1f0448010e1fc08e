//! Per-client request rate limiting
//!
//! Fixed-window counters keyed by an opaque client key (typically the peer IP).
//! Each key's window is read, rotated and incremented under that key's map
//! shard lock, so concurrent requests from one client cannot both slip past
//! the limit. Checks never suspend.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

/// Request counter for one client key
#[derive(Debug)]
struct Window {
    /// Requests admitted (or attempted) in the current window
    count: u32,
    /// Start of the current window
    started: Instant,
    /// Last request seen, for idle eviction
    last_seen: Instant,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            started: now,
            last_seen: now,
        }
    }

    fn try_admit(&mut self, now: Instant, limit: u32, window: Duration) -> Option<Duration> {
        if now.duration_since(self.started) >= window {
            self.started = now;
            self.count = 0;
        }
        self.last_seen = now;

        if self.count >= limit {
            let elapsed = now.duration_since(self.started);
            return Some(window.saturating_sub(elapsed));
        }
        self.count += 1;
        None
    }
}

/// Rate limiter with per-key tracking
pub struct RateLimiter {
    /// Per-key windows
    windows: DashMap<String, Window>,
    /// Configuration
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    fn is_exempt(&self, key: &str) -> bool {
        !self.config.enabled || self.config.exempt_keys.iter().any(|k| k == key)
    }

    /// Admit or reject one request from `key`
    pub fn check(&self, key: &str) -> Result<()> {
        self.check_at(key, Instant::now())
    }

    /// Admit or reject one request from `key` as of `now`
    ///
    /// Rejections do not consume quota. The error carries the time until the
    /// current window ends, rounded up to whole seconds.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<()> {
        if self.is_exempt(key) {
            return Ok(());
        }

        let retry_after = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window::new(now))
            .try_admit(now, self.config.max_requests, self.config.window);

        match retry_after {
            None => Ok(()),
            Some(wait) => {
                let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                tracing::debug!(
                    client = key,
                    retry_after_secs,
                    "rate limit exceeded"
                );
                Err(Error::RateLimitExceeded {
                    key: key.to_string(),
                    retry_after_secs: retry_after_secs.max(1),
                })
            }
        }
    }

    /// Requests still available to `key` in its current window
    pub fn remaining(&self, key: &str) -> u32 {
        self.remaining_at(key, Instant::now())
    }

    /// Requests still available to `key` as of `now`
    pub fn remaining_at(&self, key: &str, now: Instant) -> u32 {
        if self.is_exempt(key) {
            return self.config.max_requests;
        }
        match self.windows.get(key) {
            Some(w) if now.duration_since(w.started) < self.config.window => {
                self.config.max_requests.saturating_sub(w.count)
            }
            _ => self.config.max_requests,
        }
    }

    /// Drop state for keys idle longer than the configured eviction period
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// Drop state for keys idle longer than the eviction period as of `now`
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let idle = self.config.idle_eviction.max(self.config.window);
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.last_seen) < idle);
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked client keys
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
