//! Redis-backed Rate Limiter (C3), per `spec.md` §4.7.
//!
//! The check-and-increment is a single server-side Lua script so the
//! read-compare-increment sequence is atomic under concurrent callers —
//! two requests racing on the same key can never both observe `Allowed`
//! when only one increment fits under the threshold.

use chatify_core::ratelimit::{RateLimitDecision, RateLimitError, RateLimiter};
use redis::Script;
use std::future::Future;
use std::pin::Pin;

/// `KEYS[1]` = counter key, `ARGV[1]` = threshold, `ARGV[2]` = window seconds.
/// Returns `1` for allowed (and increments), `0` for denied.
const FIXED_WINDOW_SCRIPT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current < tonumber(ARGV[1]) then
    redis.call('INCR', KEYS[1])
    redis.call('EXPIRE', KEYS[1], ARGV[2])
    return 1
else
    return 0
end
";

/// Redis-backed [`RateLimiter`] implementing the fixed-window algorithm
/// from §4.7.
pub struct RedisRateLimiter {
    connection: redis::aio::ConnectionManager,
    script: Script,
    threshold: u32,
    window_seconds: u64,
}

impl RedisRateLimiter {
    /// Connect to Redis at `connection_string`, enforcing `threshold` sends
    /// per `window_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Unavailable`] if the connection could not
    /// be established.
    pub async fn connect(
        connection_string: &str,
        threshold: u32,
        window_seconds: u64,
    ) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(connection_string)
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        Ok(Self {
            connection,
            script: Script::new(FIXED_WINDOW_SCRIPT),
            threshold,
            window_seconds,
        })
    }

    /// The store key for `sender_id`, per §3:
    /// `rl:{user_id}:SendMessage:{window_seconds}`.
    fn key(&self, sender_id: &str) -> String {
        rate_limit_key(sender_id, self.window_seconds)
    }
}

/// The store key for `sender_id` under `window_seconds`, per §3:
/// `rl:{user_id}:SendMessage:{window_seconds}`.
fn rate_limit_key(sender_id: &str, window_seconds: u64) -> String {
    format!("rl:{sender_id}:SendMessage:{window_seconds}")
}

impl RateLimiter for RedisRateLimiter {
    fn check_and_increment(
        &self,
        sender_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<RateLimitDecision, RateLimitError>> + Send + '_>> {
        let key = self.key(sender_id);
        let sender_id = sender_id.to_string();

        Box::pin(async move {
            let mut conn = self.connection.clone();
            let allowed: i32 = self
                .script
                .key(&key)
                .arg(self.threshold)
                .arg(self.window_seconds)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;

            let decision = if allowed == 1 {
                RateLimitDecision::Allowed
            } else {
                tracing::debug!(sender_id, "rate limit exceeded");
                RateLimitDecision::Exceeded
            };
            Ok(decision)
        })
    }
}
