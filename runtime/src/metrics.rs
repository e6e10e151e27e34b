//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for every Chatify component:
//! - Send Pipeline (C7) accept/reject counters
//! - Broadcast Consumer (C5) deliver/drop counters
//! - History Writer (C6) write/failure/dead-letter counters
//! - Rate Limiter (C3) denial counter
//! - Presence Registry (C2) online gauge
//! - Circuit breaker and retry, shared ambient concerns across all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use chatify_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Initialize metrics and start the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns error if metrics exporter cannot be installed or server cannot bind.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this will fail
    /// with `MetricsError::Install`. In production, ensure this is only called once.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        // Register all metric descriptions
        register_metrics();

        // Build and install the Prometheus exporter
        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        // Try to install the recorder
        // In tests, this may fail if a recorder is already installed
        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    // In tests, multiple MetricsServer instances may be created
                    // We'll allow this but warn about it
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Send Pipeline Metrics (C7)
    describe_counter!(
        "chatify_send_total",
        "Total number of send requests accepted and published"
    );
    describe_counter!(
        "chatify_send_rejected_total",
        "Total number of send requests rejected, labeled by reason"
    );
    describe_histogram!(
        "chatify_send_duration_seconds",
        "Time taken to validate, rate-limit, stamp, and publish a send"
    );

    // Broadcast Consumer Metrics (C5)
    describe_counter!(
        "chatify_broadcast_delivered_total",
        "Total number of events delivered to local connections"
    );
    describe_counter!(
        "chatify_broadcast_dropped_total",
        "Total number of deliveries dropped (timed-out or closed connection)"
    );

    // History Writer Metrics (C6)
    describe_counter!(
        "chatify_history_write_total",
        "Total number of events durably appended to the columnar store"
    );
    describe_counter!(
        "chatify_history_write_failed_total",
        "Total number of columnar store writes that failed after exhausting retries"
    );
    describe_counter!(
        "chatify_history_dlq_total",
        "Total number of events routed to the dead-letter table"
    );

    // Rate Limiter Metrics (C3)
    describe_counter!(
        "chatify_rate_limit_denied_total",
        "Total number of sends denied by the rate limiter"
    );

    // Presence Metrics (C2)
    describe_gauge!(
        "chatify_presence_online_gauge",
        "Current number of distinct online (presence, scope) pairs known to this pod"
    );

    // Circuit Breaker Metrics (shared ambient concern)
    describe_gauge!(
        "circuit_breaker_state",
        "Current circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_counter!(
        "circuit_breaker_calls_total",
        "Total number of calls through circuit breaker"
    );
    describe_counter!(
        "circuit_breaker_successes_total",
        "Total number of successful calls"
    );
    describe_counter!(
        "circuit_breaker_failures_total",
        "Total number of failed calls"
    );
    describe_counter!(
        "circuit_breaker_rejections_total",
        "Total number of rejected calls (circuit open)"
    );

    // Retry Metrics (shared ambient concern)
    describe_counter!(
        "retry_attempts_total",
        "Total number of retry attempts"
    );
    describe_counter!(
        "retry_successes_total",
        "Total number of successful retries"
    );
    describe_counter!(
        "retry_exhausted_total",
        "Total number of retry attempts that exhausted max retries"
    );
}

/// Send Pipeline metrics recorder (C7).
pub struct SendPipelineMetrics;

impl SendPipelineMetrics {
    /// Record an accepted, published send.
    pub fn record_accepted(duration: Duration) {
        counter!("chatify_send_total").increment(1);
        histogram!("chatify_send_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rejected send, labeled by the stable error code that
    /// rejected it (e.g. `"validation"`, `"rate_limit_exceeded"`).
    pub fn record_rejected(reason: &'static str) {
        counter!("chatify_send_rejected_total", "reason" => reason).increment(1);
    }
}

/// Broadcast Consumer metrics recorder (C5).
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record a successful delivery to one local connection.
    pub fn record_delivered() {
        counter!("chatify_broadcast_delivered_total").increment(1);
    }

    /// Record a dropped delivery (timed out or the connection closed).
    pub fn record_dropped() {
        counter!("chatify_broadcast_dropped_total").increment(1);
    }
}

/// History Writer metrics recorder (C6).
pub struct HistoryWriterMetrics;

impl HistoryWriterMetrics {
    /// Record a successful durable append.
    pub fn record_write() {
        counter!("chatify_history_write_total").increment(1);
    }

    /// Record a write that failed after exhausting its retry budget.
    pub fn record_write_failed() {
        counter!("chatify_history_write_failed_total").increment(1);
    }

    /// Record an event routed to the dead-letter table.
    pub fn record_dead_lettered() {
        counter!("chatify_history_dlq_total").increment(1);
    }
}

/// Rate Limiter metrics recorder (C3).
pub struct RateLimitMetrics;

impl RateLimitMetrics {
    /// Record a send denied by the rate limiter.
    pub fn record_denied() {
        counter!("chatify_rate_limit_denied_total").increment(1);
    }
}

/// Presence Registry metrics recorder (C2).
pub struct PresenceMetrics;

impl PresenceMetrics {
    /// Set the current online-pairs gauge.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_online(count: u64) {
        gauge!("chatify_presence_online_gauge").set(count as f64);
    }
}

/// Circuit breaker metrics recorder.
pub struct CircuitBreakerMetrics;

impl CircuitBreakerMetrics {
    /// Record circuit breaker state.
    ///
    /// 0 = Closed, 1 = `HalfOpen`, 2 = Open
    pub fn record_state(state: f64) {
        gauge!("circuit_breaker_state").set(state);
    }

    /// Record a call attempt.
    pub fn record_call() {
        counter!("circuit_breaker_calls_total").increment(1);
    }

    /// Record a successful call.
    pub fn record_success() {
        counter!("circuit_breaker_successes_total").increment(1);
    }

    /// Record a failed call.
    pub fn record_failure() {
        counter!("circuit_breaker_failures_total").increment(1);
    }

    /// Record a rejected call (circuit open).
    pub fn record_rejection() {
        counter!("circuit_breaker_rejections_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
    }

    #[tokio::test]
    async fn test_metrics_server_start() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);

        let result = server.start();
        assert!(result.is_ok());
        // Note: handle might be None if another test already initialized the recorder
        // This is OK - the recorder is still installed globally
    }

    #[tokio::test]
    async fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);

        server.start().unwrap();

        SendPipelineMetrics::record_accepted(Duration::from_millis(5));
        BroadcastMetrics::record_delivered();

        // If this test runs after another test initialized the recorder,
        // handle might be None. That's OK - metrics are still being recorded.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("chatify_send_total"));
            assert!(rendered.contains("chatify_broadcast_delivered_total"));
        }
    }

    #[tokio::test]
    async fn test_history_writer_metrics() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        HistoryWriterMetrics::record_write();
        HistoryWriterMetrics::record_write_failed();
        HistoryWriterMetrics::record_dead_lettered();

        if let Some(rendered) = server.render() {
            assert!(rendered.contains("chatify_history_write_total"));
            assert!(rendered.contains("chatify_history_write_failed_total"));
            assert!(rendered.contains("chatify_history_dlq_total"));
        }
    }

    #[tokio::test]
    async fn test_send_rejected_metrics_label_by_reason() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        SendPipelineMetrics::record_rejected("validation");
        RateLimitMetrics::record_denied();

        if let Some(rendered) = server.render() {
            assert!(rendered.contains("chatify_send_rejected_total"));
            assert!(rendered.contains("chatify_rate_limit_denied_total"));
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_metrics() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        CircuitBreakerMetrics::record_state(0.0); // Closed
        CircuitBreakerMetrics::record_call();
        CircuitBreakerMetrics::record_success();

        // If this test runs after another test initialized the recorder,
        // handle might be None. That's OK - metrics are still being recorded.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("circuit_breaker_state"));
            assert!(rendered.contains("circuit_breaker_calls_total"));
        }
    }
}
