//! Conversion progress states

use serde::Serialize;

/// Where a conversion request currently is
///
/// `Idle → RateLimitChecking → {RateLimited | Hashing} → CacheChecking →
/// {CacheHit | Extracting} → Scoring → Caching → Done`, with `Errored`
/// reachable from every step that can fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ConversionState {
    Idle,
    RateLimitChecking,
    RateLimited { retry_after_seconds: u64 },
    Hashing,
    CacheChecking,
    CacheHit,
    Extracting,
    Scoring,
    Caching,
    Done,
    Errored { message: String },
}

impl ConversionState {
    /// Stable stage name used in progress events and logs
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RateLimitChecking => "rate_limit_checking",
            Self::RateLimited { .. } => "rate_limited",
            Self::Hashing => "hashing",
            Self::CacheChecking => "cache_checking",
            Self::CacheHit => "cache_hit",
            Self::Extracting => "extracting",
            Self::Scoring => "scoring",
            Self::Caching => "caching",
            Self::Done => "done",
            Self::Errored { .. } => "errored",
        }
    }

    /// Human readable progress message
    pub fn description(&self) -> String {
        match self {
            Self::Idle => "Waiting to start".to_string(),
            Self::RateLimitChecking => "Checking request quota".to_string(),
            Self::RateLimited {
                retry_after_seconds,
            } => format!("Rate limit reached, retry in {}s", retry_after_seconds),
            Self::Hashing => "Fingerprinting document".to_string(),
            Self::CacheChecking => "Looking for a previous conversion".to_string(),
            Self::CacheHit => "Reusing previous conversion".to_string(),
            Self::Extracting => "Converting document to Markdown".to_string(),
            Self::Scoring => "Assessing conversion quality".to_string(),
            Self::Caching => "Storing result".to_string(),
            Self::Done => "Conversion complete".to_string(),
            Self::Errored { message } => message.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Errored { .. } | Self::RateLimited { .. }
        )
    }
}

impl std::fmt::Display for ConversionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stage())
    }
}
