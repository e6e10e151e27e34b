//! Send Pipeline (C7): the single path a client's outgoing message takes
//! from raw input to a durably published [`EnrichedChatEvent`].
//!
//! Implements the exact sequence from §4.1: validate, rate-limit, stamp,
//! publish, return. Every dependency is injected as a trait object so tests
//! can swap in-memory implementations without touching this module.

use chatify_core::clock::Clock;
use chatify_core::error::{ChatifyError, ChatifyResult};
use chatify_core::event::{ChatEvent, EnrichedChatEvent};
use chatify_core::event_bus::EventProducer;
use chatify_core::identity::PodIdentity;
use chatify_core::ratelimit::{RateLimitDecision, RateLimiter};
use chatify_core::scope::{ScopeId, ScopeKey};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::metrics::{RateLimitMetrics, SendPipelineMetrics};

/// Maximum message body length in bytes, per §3.
pub const MAX_TEXT_BYTES: usize = 4096;

/// Maximum sender id length in characters, per §3.
pub const MAX_SENDER_ID_CHARS: usize = 256;

/// Validates, rate-limits, stamps, and publishes an outgoing message (C7).
///
/// Holds no state of its own beyond its injected dependencies, so it is
/// cheap to construct once per pod and share behind an `Arc`.
pub struct SendPipeline {
    rate_limiter: Arc<dyn RateLimiter>,
    producer: Arc<dyn EventProducer>,
    clock: Arc<dyn Clock>,
    identity: Arc<dyn PodIdentity>,
}

impl SendPipeline {
    /// Construct a pipeline from its four injected dependencies.
    #[must_use]
    pub fn new(
        rate_limiter: Arc<dyn RateLimiter>,
        producer: Arc<dyn EventProducer>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn PodIdentity>,
    ) -> Self {
        Self {
            rate_limiter,
            producer,
            clock,
            identity,
        }
    }

    /// Send `text` from `sender_id` into `scope`, per §4.1's five-step
    /// sequence:
    ///
    /// 1. Validate `sender_id`, `scope`, and `text`.
    /// 2. Consult the rate limiter (C3); reject if the sender is over quota.
    /// 3. Stamp a fresh `message_id`, `created_at_utc`, and `origin_pod_id`.
    /// 4. Publish through the event producer (C4).
    /// 5. Return the published event enriched with its partition/offset.
    ///
    /// `scope` is revalidated here even though [`ScopeKey`] can be
    /// constructed with [`ScopeId::new_unchecked`] — that escape hatch exists
    /// for round-tripping already-validated data (e.g. reading a scope back
    /// out of storage), not for callers of this pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ChatifyError::Validation`] if `sender_id`, `scope`, or
    /// `text` fail validation, [`ChatifyError::RateLimitExceeded`] if the sender is over
    /// quota, [`ChatifyError::ConfigurationError`] if this pod's identity is
    /// empty or the rate limit store is unreachable (fail-fast, per §4.7 —
    /// a store outage is an ops signal, never an implicit allow), and
    /// [`ChatifyError::EventProductionFailed`] if publishing did not reach
    /// durability within the retry budget.
    pub async fn send(
        &self,
        sender_id: &str,
        scope: ScopeKey,
        text: &str,
    ) -> ChatifyResult<EnrichedChatEvent> {
        let started = Instant::now();
        match self.send_inner(sender_id, scope, text).await {
            Ok(enriched) => {
                SendPipelineMetrics::record_accepted(started.elapsed());
                Ok(enriched)
            }
            Err(err) => {
                if matches!(err, ChatifyError::RateLimitExceeded { .. }) {
                    RateLimitMetrics::record_denied();
                }
                SendPipelineMetrics::record_rejected(err.code());
                Err(err)
            }
        }
    }

    async fn send_inner(
        &self,
        sender_id: &str,
        scope: ScopeKey,
        text: &str,
    ) -> ChatifyResult<EnrichedChatEvent> {
        validate_sender_id(sender_id)?;
        validate_scope(&scope)?;
        validate_text(text)?;

        match self.rate_limiter.check_and_increment(sender_id).await {
            Ok(RateLimitDecision::Allowed) => {}
            Ok(RateLimitDecision::Exceeded) => {
                return Err(ChatifyError::rate_limit_exceeded(sender_id));
            }
            Err(e) => {
                tracing::warn!(sender_id, error = %e, "rate limit store unreachable, failing fast");
                return Err(ChatifyError::configuration_with_source(
                    "rate limit store unreachable",
                    e,
                ));
            }
        }

        let pod_id = self.identity.pod_id();
        if pod_id.trim().is_empty() {
            return Err(ChatifyError::configuration("pod identity is empty"));
        }

        let event = ChatEvent::new(
            Uuid::new_v4(),
            &scope,
            sender_id,
            text,
            self.clock.now(),
            pod_id,
        );

        let (partition, offset) = self
            .producer
            .publish(&scope, &event)
            .await
            .map_err(|e| ChatifyError::event_production_failed("failed to publish event", e))?;

        Ok(EnrichedChatEvent::new(event, partition, offset))
    }
}

fn validate_sender_id(sender_id: &str) -> ChatifyResult<()> {
    if sender_id.is_empty() || sender_id.chars().count() > MAX_SENDER_ID_CHARS {
        return Err(ChatifyError::validation(format!(
            "sender_id must be 1..={MAX_SENDER_ID_CHARS} characters, got {}",
            sender_id.chars().count()
        )));
    }
    if sender_id.chars().any(char::is_whitespace) {
        return Err(ChatifyError::validation(
            "sender_id must not contain whitespace",
        ));
    }
    Ok(())
}

fn validate_scope(scope: &ScopeKey) -> ChatifyResult<()> {
    ScopeId::from_str(scope.scope_id.as_str())
        .map(|_| ())
        .map_err(|e| ChatifyError::validation(format!("invalid scope id: {e}")))
}

fn validate_text(text: &str) -> ChatifyResult<()> {
    if text.len() > MAX_TEXT_BYTES {
        return Err(ChatifyError::validation(format!(
            "text must be at most {MAX_TEXT_BYTES} bytes, got {}",
            text.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatify_core::event_bus::EventBusError;
    use chatify_core::ratelimit::RateLimitError;
    use chatify_core::scope::{ScopeId, ScopeType};
    use chrono::{DateTime, Utc};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct StaticRateLimiter(RateLimitDecision);
    impl RateLimiter for StaticRateLimiter {
        fn check_and_increment(
            &self,
            _sender_id: &str,
        ) -> Pin<Box<dyn Future<Output = Result<RateLimitDecision, RateLimitError>> + Send + '_>>
        {
            let decision = self.0;
            Box::pin(async move { Ok(decision) })
        }
    }

    struct FailingRateLimiter;
    impl RateLimiter for FailingRateLimiter {
        fn check_and_increment(
            &self,
            _sender_id: &str,
        ) -> Pin<Box<dyn Future<Output = Result<RateLimitDecision, RateLimitError>> + Send + '_>>
        {
            Box::pin(async move { Err(RateLimitError::Unavailable("down".to_string())) })
        }
    }

    struct RecordingProducer {
        next_offset: AtomicI64,
        fail: AtomicBool,
    }

    impl RecordingProducer {
        fn new() -> Self {
            Self {
                next_offset: AtomicI64::new(0),
                fail: AtomicBool::new(false),
            }
        }

        fn failing() -> Self {
            Self {
                next_offset: AtomicI64::new(0),
                fail: AtomicBool::new(true),
            }
        }
    }

    impl EventProducer for RecordingProducer {
        fn publish(
            &self,
            scope: &ScopeKey,
            _event: &ChatEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(i32, i64), EventBusError>> + Send + '_>>
        {
            let fail = self.fail.load(Ordering::SeqCst);
            let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
            let scope = scope.canonical();
            Box::pin(async move {
                if fail {
                    Err(EventBusError::PublishFailed {
                        scope,
                        reason: "simulated failure".to_string(),
                    })
                } else {
                    Ok((0, offset))
                }
            })
        }
    }

    fn scope() -> ScopeKey {
        ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("general"))
    }

    fn pipeline(
        rate_limiter: Arc<dyn RateLimiter>,
        producer: Arc<dyn EventProducer>,
        pod_id: &str,
    ) -> SendPipeline {
        SendPipeline::new(
            rate_limiter,
            producer,
            Arc::new(FixedClock(Utc::now())),
            Arc::new(chatify_core::identity::StaticPodIdentity::new(pod_id)),
        )
    }

    #[tokio::test]
    async fn happy_path_returns_enriched_event() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Allowed)),
            Arc::new(RecordingProducer::new()),
            "pod-1",
        );
        let enriched = pipeline
            .send("user-a", scope(), "hello")
            .await
            .expect("send succeeds");
        assert_eq!(enriched.event.sender_id, "user-a");
        assert_eq!(enriched.event.text, "hello");
        assert_eq!(enriched.event.origin_pod_id, "pod-1");
        assert_eq!(enriched.partition, 0);
        assert_eq!(enriched.offset, 0);
    }

    #[tokio::test]
    async fn rejects_empty_sender_id() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Allowed)),
            Arc::new(RecordingProducer::new()),
            "pod-1",
        );
        let err = pipeline.send("", scope(), "hello").await.unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn rejects_oversized_text() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Allowed)),
            Arc::new(RecordingProducer::new()),
            "pod-1",
        );
        let text = "a".repeat(MAX_TEXT_BYTES + 1);
        let err = pipeline.send("user-a", scope(), &text).await.unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn rejects_whitespace_in_sender_id() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Allowed)),
            Arc::new(RecordingProducer::new()),
            "pod-1",
        );
        let err = pipeline
            .send("user a", scope(), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn rejects_scope_id_with_whitespace() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Allowed)),
            Arc::new(RecordingProducer::new()),
            "pod-1",
        );
        let bad_scope = ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("has space"));
        let err = pipeline
            .send("user-a", bad_scope, "hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn surfaces_rate_limit_exceeded() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Exceeded)),
            Arc::new(RecordingProducer::new()),
            "pod-1",
        );
        let err = pipeline
            .send("user-a", scope(), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "rate_limit_exceeded");
    }

    #[tokio::test]
    async fn fails_fast_when_rate_limit_store_unavailable() {
        let pipeline = pipeline(
            Arc::new(FailingRateLimiter),
            Arc::new(RecordingProducer::new()),
            "pod-1",
        );
        let err = pipeline
            .send("user-a", scope(), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }

    #[tokio::test]
    async fn surfaces_publish_failure() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Allowed)),
            Arc::new(RecordingProducer::failing()),
            "pod-1",
        );
        let err = pipeline
            .send("user-a", scope(), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "event_production_failed");
    }

    #[tokio::test]
    async fn rejects_empty_pod_identity() {
        let pipeline = pipeline(
            Arc::new(StaticRateLimiter(RateLimitDecision::Allowed)),
            Arc::new(RecordingProducer::new()),
            "",
        );
        let err = pipeline
            .send("user-a", scope(), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }
}
