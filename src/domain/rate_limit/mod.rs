//! Rate limiting domain types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fixed-window rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Effectively disables limiting
    pub fn unlimited() -> Self {
        Self {
            max_requests: u32::MAX,
            window: Duration::from_secs(60),
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Total limit for the window
    pub limit: u32,
    /// When the current window resets
    pub reset_at: DateTime<Utc>,
    /// Seconds the caller must wait before retrying (only when denied)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}
