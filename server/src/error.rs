//! Errors from wiring up and starting a pod.

use chatify_core::columnar::ColumnarStoreError;
use chatify_core::event_bus::EventBusError;
use chatify_core::presence::PresenceError;
use chatify_core::ratelimit::RateLimitError;
use chatify_runtime::metrics::MetricsError;
use thiserror::Error;

/// Failures that can occur while constructing and starting a pod's backends.
#[derive(Error, Debug)]
pub enum StartupError {
    /// `Config::metrics_addr` did not parse as a socket address.
    #[error("invalid metrics address: {0}")]
    InvalidMetricsAddr(std::net::AddrParseError),

    /// The metrics server failed to bind or install its recorder.
    #[error("metrics server failed to start: {0}")]
    Metrics(#[from] MetricsError),

    /// The log transport (C4) could not be reached.
    #[error("event bus connection failed: {0}")]
    EventBus(#[from] EventBusError),

    /// The presence store (C2) could not be reached.
    #[error("presence store connection failed: {0}")]
    Presence(#[from] PresenceError),

    /// The rate limiter's store (C3) could not be reached.
    #[error("rate limiter connection failed: {0}")]
    RateLimit(#[from] RateLimitError),

    /// The columnar store (C6/C8) could not be reached.
    #[error("columnar store connection failed: {0}")]
    ColumnarStore(#[from] ColumnarStoreError),
}
