//! Rate Limiter contract (C3): a fixed-window per-sender send quota, shared
//! fleet-wide through the same key-value store as the Presence Registry.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by the rate limiter.
#[derive(Error, Debug, Clone)]
pub enum RateLimitError {
    /// The backing store could not be reached. Per the Design Notes (§4.7),
    /// callers must fail closed (reject the send) rather than silently
    /// allowing unlimited throughput when the limiter is unavailable.
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// The outcome of a [`RateLimiter::check_and_increment`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The sender is within their quota; the send may proceed. The counter
    /// has already been incremented.
    Allowed,
    /// The sender has exceeded their quota for the current window.
    Exceeded,
}

/// Enforces a fixed-window send quota per sender (§3, §4.7).
///
/// `check_and_increment` must be atomic: concurrent callers racing on the
/// same sender must never both observe `Allowed` when only one increment
/// fits under the limit. Implementations back this with an atomically
/// scripted read-increment-compare rather than a separate GET then SET.
pub trait RateLimiter: Send + Sync {
    /// Atomically check and, if allowed, consume one unit of `sender_id`'s
    /// quota for the current fixed window.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Unavailable`] if the store could not be
    /// reached. Callers must treat this as a send rejection (fail closed),
    /// never as an implicit allow.
    fn check_and_increment(
        &self,
        sender_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<RateLimitDecision, RateLimitError>> + Send + '_>>;
}
