//! In-memory fixed-window rate limiter, standing in for `chatify-keyvalue`'s
//! Redis Lua-scripted implementation in tests (§8 property 4, scenario S3).

use chatify_core::clock::Clock;
use chatify_core::ratelimit::{RateLimitDecision, RateLimitError, RateLimiter};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Fixed-window counter per sender, reset whenever the window has elapsed
/// per the injected clock rather than a wall-clock sleep.
pub struct InMemoryRateLimiter {
    clock: Arc<dyn Clock>,
    threshold: u32,
    window: ChronoDuration,
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimiter {
    /// Allow up to `threshold` sends per `window` per sender.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, threshold: u32, window: std::time::Duration) -> Self {
        Self {
            clock,
            threshold,
            window: ChronoDuration::from_std(window).unwrap_or(ChronoDuration::zero()),
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check_and_increment(
        &self,
        sender_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<RateLimitDecision, RateLimitError>> + Send + '_>> {
        let now = self.clock.now();
        let mut guard = self.windows.lock().expect("rate limit mutex poisoned");
        let window = guard.entry(sender_id.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now - window.started_at >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        let decision = if window.count < self.threshold {
            window.count += 1;
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Exceeded
        };
        Box::pin(async move { Ok(decision) })
    }
}
