//! Redis-backed counters behind the per-IP and per-tenant request budgets.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use redis::Script;

use auditvault_application::{AttemptInfo, RateLimitStore};
use auditvault_core::{AppError, AppResult};

/// Bumps the counter for one `rate_limit:global:<ip>` or
/// `rate_limit:tenant:<tenant>` key and reports how much of the window is
/// left. The first hit arms the expiry; the TTL guard re-arms a counter
/// that somehow lost its expiry so it cannot throttle forever.
const BUMP_WINDOW_SCRIPT: &str = r#"
local hits = redis.call('INCR', KEYS[1])
local window_left = redis.call('TTL', KEYS[1])
if window_left < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
  window_left = tonumber(ARGV[1])
end
return {hits, window_left}
"#;

/// Redis implementation of the rate limit counter port.
///
/// Counter state lives entirely in Redis, keeping API processes stateless;
/// the script runs the increment and the expiry arm as one atomic step so
/// concurrent requests on a fresh window never race each other into an
/// unexpiring key. Keys clean themselves up when their window lapses.
#[derive(Clone)]
pub struct RedisRateLimitRepository {
    client: redis::Client,
}

impl RedisRateLimitRepository {
    /// Builds the repository from a Redis connection URL.
    pub fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|error| AppError::Validation(format!("invalid redis url: {error}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitRepository {
    async fn record_attempt(
        &self,
        key: &str,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        if window_duration_seconds <= 0 {
            return Err(AppError::Validation(
                "window_duration_seconds must be greater than zero".to_owned(),
            ));
        }

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("redis is unreachable for rate limiting: {error}"))
            })?;

        let (hits, window_left): (i64, i64) = Script::new(BUMP_WINDOW_SCRIPT)
            .key(key)
            .arg(window_duration_seconds)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("rate limit counter bump failed: {error}"))
            })?;

        // The window opened when its TTL was first armed, i.e. however much
        // of the window has already elapsed ago.
        let elapsed = window_duration_seconds - window_left.clamp(0, window_duration_seconds);

        Ok(AttemptInfo {
            attempt_count: hits,
            window_started_at: Utc::now() - Duration::seconds(elapsed),
        })
    }
}
