//! # Chatify Runtime
//!
//! The drivers that turn `chatify-core`'s traits into running loops:
//!
//! - [`send_pipeline`] — C7, the Send Pipeline: validate, rate-limit, stamp,
//!   publish.
//! - [`broadcast_consumer`] — C5, the per-pod Broadcast Consumer loop.
//! - [`history_writer`] — C6, the shared History Writer loop.
//!
//! Plus the ambient concerns every driver above leans on:
//!
//! - [`retry`] — exponential backoff with jitter.
//! - [`circuit_breaker`] — the closed/open/half-open state machine guarding
//!   calls to external dependencies.
//! - [`metrics`] — Prometheus counters/gauges/histograms for all of the
//!   above.

pub mod broadcast_consumer;
pub mod circuit_breaker;
pub mod history_writer;
pub mod metrics;
pub mod retry;
pub mod send_pipeline;

pub use broadcast_consumer::BroadcastConsumerLoop;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
pub use history_writer::{DeadLetterSink, HistoryWriterLoop, LoggingDeadLetterSink};
pub use retry::{retry_with_backoff, retry_with_predicate, RetryPolicy};
pub use send_pipeline::SendPipeline;
