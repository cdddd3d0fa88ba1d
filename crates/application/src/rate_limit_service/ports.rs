use async_trait::async_trait;
use chrono::{DateTime, Utc};

use auditvault_core::AppResult;

/// Port for the external atomic counter store.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically increments the counter for `key`, arming the TTL to
    /// `window_duration_seconds` on the first hit of a window. Returns the
    /// updated count and when the active window started.
    async fn record_attempt(
        &self,
        key: &str,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo>;
}

/// Counter state for the active window of one key.
#[derive(Debug, Clone)]
pub struct AttemptInfo {
    /// Number of attempts in the current window, including this one.
    pub attempt_count: i64,
    /// When the current window started.
    pub window_started_at: DateTime<Utc>,
}
