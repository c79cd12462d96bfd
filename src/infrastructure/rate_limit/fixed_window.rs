//! Rate limiter implementation
//!
//! Provides fixed window rate limiting keyed by client identity.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::clock::{add_duration, remaining_until, Clock, SystemClock};
use crate::domain::rate_limit::{RateLimitConfig, RateLimitDecision};

/// Window bookkeeping for one identifier
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_started_at: DateTime<Utc>,
    reset_at: DateTime<Utc>,
}

impl WindowState {
    fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            window_started_at: now,
            reset_at: add_duration(now, window),
        }
    }

    fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }
}

/// Fixed window rate limiter
///
/// Windows start lazily on an identifier's first request and reset wholesale
/// once `reset_at` passes. A client can therefore land up to twice the limit
/// in quick succession around a window boundary.
#[derive(Debug)]
pub struct RateLimiter {
    /// Per-identifier windows
    windows: RwLock<HashMap<String, WindowState>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    /// Cleanup interval
    cleanup_interval: Duration,
    /// Last cleanup time
    last_cleanup: RwLock<DateTime<Utc>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();

        Self {
            windows: RwLock::new(HashMap::new()),
            config,
            clock,
            cleanup_interval: Duration::from_secs(300), // 5 minutes
            last_cleanup: RwLock::new(now),
        }
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts a request against `identifier` if its window has room
    ///
    /// Denied requests are not counted.
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        self.maybe_cleanup().await;

        let now = self.clock.now();
        let limit = self.config.max_requests;
        let mut windows = self.windows.write().await;

        let state = windows
            .entry(identifier.to_string())
            .or_insert_with(|| WindowState::open(now, self.config.window));

        if state.has_elapsed(now) {
            *state = WindowState::open(now, self.config.window);
        }

        if state.count < limit {
            state.count += 1;

            return RateLimitDecision {
                allowed: true,
                remaining: limit - state.count,
                limit,
                reset_at: state.reset_at,
                retry_after_seconds: None,
            };
        }

        let retry_after = self.retry_after_seconds(now, state.reset_at);
        debug!(
            identifier = %identifier,
            window_started_at = %state.window_started_at,
            retry_after_seconds = retry_after,
            "Rate limit exceeded"
        );

        RateLimitDecision {
            allowed: false,
            remaining: 0,
            limit,
            reset_at: state.reset_at,
            retry_after_seconds: Some(retry_after),
        }
    }

    /// Reset rate limits for an identifier
    pub async fn reset(&self, identifier: &str) {
        let mut windows = self.windows.write().await;
        windows.remove(identifier);
    }

    /// Drops every window whose reset time has passed
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;
        let before = windows.len();

        windows.retain(|_, state| !state.has_elapsed(now));

        before - windows.len()
    }

    /// Number of identifiers currently tracked
    pub async fn tracked_identifiers(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Starts a periodic sweep that ends once the limiter is dropped
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        let interval = self.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(limiter) = limiter.upgrade() else {
                    break;
                };

                let removed = limiter.sweep().await;
                if removed > 0 {
                    debug!(removed, "Swept elapsed rate limit windows");
                }
            }
        })
    }

    /// Seconds until `reset_at`, rounded up, within `1..=window`
    fn retry_after_seconds(&self, now: DateTime<Utc>, reset_at: DateTime<Utc>) -> u64 {
        let window_secs = self.config.window.as_millis().div_ceil(1000).max(1) as u64;
        let remaining_ms = remaining_until(now, reset_at).as_millis();

        (remaining_ms.div_ceil(1000) as u64).clamp(1, window_secs)
    }

    async fn maybe_cleanup(&self) {
        let now = self.clock.now();
        let should_cleanup = {
            let last = self.last_cleanup.read().await;
            remaining_until(*last, now) >= self.cleanup_interval
        };

        if should_cleanup {
            let mut last = self.last_cleanup.write().await;
            *last = now;
            drop(last);

            self.sweep().await;
        }
    }
}
