//! End-to-end scenario tests (§8) run against `chatify-testing`'s in-memory
//! backends: cross-pod delivery, full-pipeline FIFO, send-then-query
//! survival of a writer restart, and poison-message isolation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chatify_core::clock::Clock;
use chatify_core::columnar::{ColumnarStore, HistoryReader};
use chatify_core::connection::{Connection, ConnectionId, UserId};
use chatify_core::delivery::ConnectionSink;
use chatify_core::event::ChatEvent;
use chatify_core::event_bus::{EventConsumer, EventProducer};
use chatify_core::identity::StaticPodIdentity;
use chatify_core::registry::ScopeRegistry;
use chatify_core::scope::{ScopeId, ScopeKey, ScopeType};
use chatify_runtime::{BroadcastConsumerLoop, DeadLetterSink, HistoryWriterLoop, RetryPolicy, SendPipeline};
use chatify_testing::clock::{test_clock, ManualClock};
use chatify_testing::columnar::InMemoryColumnarStore;
use chatify_testing::delivery::InMemoryConnectionSink;
use chatify_testing::event_bus::InMemoryEventBus;
use chatify_testing::ratelimit::InMemoryRateLimiter;
use chrono::Duration as ChronoDuration;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn scope(id: &str) -> ScopeKey {
    ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked(id))
}

fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(2)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build()
}

/// Runs `driver.run(group_id, ...)` and cancels it after `settle` so the
/// in-memory streams (which never end on their own) wind down once every
/// already-published record has been processed.
async fn run_and_cancel<F, Fut>(run: F, settle: Duration)
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: std::future::Future<Output = Result<(), chatify_core::event_bus::EventBusError>>,
{
    let cancellation = CancellationToken::new();
    let cancel_clone = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(settle).await;
        cancel_clone.cancel();
    });
    run(cancellation).await.expect("loop exits cleanly");
}

#[derive(Default)]
struct RecordingDeadLetters {
    reasons: Mutex<Vec<String>>,
}

impl DeadLetterSink for RecordingDeadLetters {
    fn record(&self, _record: &chatify_core::event::EnrichedChatEvent, reason: &str) {
        self.reasons.lock().expect("lock").push(reason.to_string());
    }
}

/// S1: a message published on one pod is delivered to a subscriber joined
/// on a different pod, via two independent `BroadcastConsumerLoop`s sharing
/// one `InMemoryEventBus`.
#[tokio::test]
async fn s1_cross_pod_delivery() {
    let bus = InMemoryEventBus::new(1);
    let scope = scope("cross-pod");

    let pod1_producer = bus.producer();
    let pod1_consumer = Arc::new(bus.consumer());
    let pod2_consumer = Arc::new(bus.consumer());

    let pod1_registry = Arc::new(ScopeRegistry::new());
    let pod2_registry = Arc::new(ScopeRegistry::new());
    // Only pod 2 has a locally joined connection; pod 1 sends but has none.
    pod2_registry.join(
        Connection::new(ConnectionId::new("c-on-pod-2"), UserId::new("u1")),
        scope.clone(),
    );

    let pod1_sink = Arc::new(InMemoryConnectionSink::new());
    let pod2_sink = Arc::new(InMemoryConnectionSink::new());

    let event = ChatEvent::new(
        Uuid::new_v4(),
        &scope,
        "user-a",
        "hello from pod 1",
        test_clock().now(),
        "pod-1",
    );
    pod1_producer.publish(&scope, &event).await.expect("publish");

    let pod1_driver = BroadcastConsumerLoop::new(
        Arc::clone(&pod1_consumer) as Arc<dyn EventConsumer>,
        Arc::clone(&pod1_registry),
        Arc::clone(&pod1_sink) as Arc<dyn ConnectionSink>,
    );
    let pod2_driver = BroadcastConsumerLoop::new(
        Arc::clone(&pod2_consumer) as Arc<dyn EventConsumer>,
        Arc::clone(&pod2_registry),
        Arc::clone(&pod2_sink) as Arc<dyn ConnectionSink>,
    );

    tokio::join!(
        run_and_cancel(|c| async move { pod1_driver.run("chatify-broadcast-pod-1", c).await }, Duration::from_millis(50)),
        run_and_cancel(|c| async move { pod2_driver.run("chatify-broadcast-pod-2", c).await }, Duration::from_millis(50)),
    );

    assert!(pod1_sink.delivered().is_empty(), "pod 1 has no local members, nothing to deliver");
    let delivered = pod2_sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].connection_id, ConnectionId::new("c-on-pod-2"));
    assert_eq!(delivered[0].event.text, "hello from pod 1");
}

/// S2: two rapid sends to the same scope arrive at a subscriber in send
/// order, exercising the send pipeline and broadcast consumer together.
#[tokio::test]
async fn s2_full_pipeline_preserves_fifo_order() {
    let bus = InMemoryEventBus::new(1);
    let scope = scope("scope-2");

    let clock = Arc::new(ManualClock::new(test_clock().now()));
    let rate_limiter = Arc::new(InMemoryRateLimiter::new(
        Arc::clone(&clock) as Arc<dyn Clock>,
        100,
        Duration::from_secs(60),
    ));
    let pipeline = SendPipeline::new(
        rate_limiter,
        Arc::new(bus.producer()) as Arc<dyn EventProducer>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(StaticPodIdentity::new("pod-1")),
    );

    pipeline.send("user-a", scope.clone(), "m1").await.expect("send m1");
    clock.advance(ChronoDuration::milliseconds(1));
    pipeline.send("user-a", scope.clone(), "m2").await.expect("send m2");

    let registry = Arc::new(ScopeRegistry::new());
    registry.join(Connection::new(ConnectionId::new("c1"), UserId::new("user-a")), scope.clone());
    let sink = Arc::new(InMemoryConnectionSink::new());

    let driver = BroadcastConsumerLoop::new(
        Arc::new(bus.consumer()) as Arc<dyn EventConsumer>,
        registry,
        Arc::clone(&sink) as Arc<dyn ConnectionSink>,
    );
    run_and_cancel(|c| async move { driver.run("chatify-broadcast-pod-1", c).await }, Duration::from_millis(50)).await;

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].event.text, "m1");
    assert_eq!(delivered[1].event.text, "m2");
    assert!(delivered[0].event.created_at_utc <= delivered[1].event.created_at_utc);
}

/// S4: a sent event eventually shows up exactly once in `query_by_scope`,
/// even across a History Writer restart. The in-memory bus hands out a
/// fresh, independent consumer per `bus.consumer()` call (no resumed offset
/// state), so "restart" here replays the whole backlog again; durability
/// comes from the columnar store's `message_id` dedup rather than from
/// offset tracking surviving the restart.
#[tokio::test]
async fn s4_send_then_query_survives_writer_restart() {
    let bus = InMemoryEventBus::new(1);
    let scope = scope("scope-4");
    let clock = Arc::new(ManualClock::new(test_clock().now()));
    let rate_limiter = Arc::new(InMemoryRateLimiter::new(
        Arc::clone(&clock) as Arc<dyn Clock>,
        100,
        Duration::from_secs(60),
    ));
    let pipeline = SendPipeline::new(
        rate_limiter,
        Arc::new(bus.producer()) as Arc<dyn EventProducer>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(StaticPodIdentity::new("pod-1")),
    );

    let first = pipeline.send("user-a", scope.clone(), "m1").await.expect("send m1");

    let store = Arc::new(InMemoryColumnarStore::new());
    let dead_letters = Arc::new(RecordingDeadLetters::default());

    let first_writer = HistoryWriterLoop::new(
        Arc::new(bus.consumer()) as Arc<dyn EventConsumer>,
        Arc::clone(&store) as Arc<dyn ColumnarStore>,
        Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
        fast_retry_policy(),
    );
    run_and_cancel(|c| async move { first_writer.run("chatify-chat-history-writer", c).await }, Duration::from_millis(50)).await;

    clock.advance(ChronoDuration::milliseconds(1));
    let second = pipeline.send("user-a", scope.clone(), "m2").await.expect("send m2");

    // Simulate the writer restarting mid-stream: a brand new instance picks
    // up from a fresh consumer and reprocesses the whole backlog.
    let second_writer = HistoryWriterLoop::new(
        Arc::new(bus.consumer()) as Arc<dyn EventConsumer>,
        Arc::clone(&store) as Arc<dyn ColumnarStore>,
        Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
        fast_retry_policy(),
    );
    run_and_cancel(|c| async move { second_writer.run("chatify-chat-history-writer", c).await }, Duration::from_millis(50)).await;

    assert!(dead_letters.reasons.lock().expect("lock").is_empty());
    assert_eq!(store.row_count(), 2);

    let rows = store
        .query_by_scope(&scope, None, None, 10)
        .await
        .expect("query");
    let ids: Vec<Uuid> = rows.iter().map(|e| e.message_id).collect();
    assert_eq!(ids.iter().filter(|id| **id == first.event.message_id).count(), 1);
    assert_eq!(ids.iter().filter(|id| **id == second.event.message_id).count(), 1);
}

/// S5: a malformed record (one whose `scope_id` fails validation) is
/// dead-lettered and its offset committed, while a subsequent well-formed
/// record on the same partition is still persisted normally.
#[tokio::test]
async fn s5_poison_message_is_isolated_from_valid_ones() {
    let bus = InMemoryEventBus::new(1);
    let scope = scope("scope-5");
    let producer = bus.producer();

    let mut poison_event = ChatEvent::new(
        Uuid::new_v4(),
        &scope,
        "user-a",
        "poison",
        test_clock().now(),
        "pod-1",
    );
    poison_event.scope_id = "not a valid scope id".to_string();
    producer.publish(&scope, &poison_event).await.expect("publish poison");

    let valid_event = ChatEvent::new(
        Uuid::new_v4(),
        &scope,
        "user-a",
        "valid",
        test_clock().now(),
        "pod-1",
    );
    producer.publish(&scope, &valid_event).await.expect("publish valid");

    let store = Arc::new(InMemoryColumnarStore::new());
    let dead_letters = Arc::new(RecordingDeadLetters::default());
    let consumer = Arc::new(bus.consumer());

    let writer = HistoryWriterLoop::new(
        Arc::clone(&consumer) as Arc<dyn EventConsumer>,
        Arc::clone(&store) as Arc<dyn ColumnarStore>,
        Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
        fast_retry_policy(),
    );
    run_and_cancel(|c| async move { writer.run("chatify-chat-history-writer", c).await }, Duration::from_millis(50)).await;

    assert_eq!(store.row_count(), 1);
    let reasons = dead_letters.reasons.lock().expect("lock");
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("unparseable scope id"));
    drop(reasons);
    assert_eq!(consumer.committed_offset(0), Some(1));
}
