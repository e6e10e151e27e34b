//! In-memory log transport, standing in for `chatify-redpanda` in tests.
//!
//! [`InMemoryEventBus`] is the shared broker: hand out an
//! [`InMemoryEventProducer`] and any number of [`InMemoryEventConsumer`]s from
//! it to simulate several pods publishing to and consuming from the same log,
//! per §8's cross-pod delivery scenarios. Partitioning matches the real
//! producer's contract — keyed by `scope.canonical()` — so partition
//! assignment is deterministic and stable across producer instances (§8
//! property 8).

use chatify_core::event::{ChatEvent, EnrichedChatEvent};
use chatify_core::event_bus::{EventBusError, EventConsumer, EventProducer, EventStream};
use chatify_core::scope::ScopeKey;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

struct Inner {
    partitions: i32,
    log: Mutex<Vec<EnrichedChatEvent>>,
    next_offset: Mutex<HashMap<i32, i64>>,
    sender: broadcast::Sender<EnrichedChatEvent>,
}

/// A shared in-memory log. Partitioned deterministically by
/// `scope.canonical()`, same as the real broker.
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl InMemoryEventBus {
    /// Construct a bus with `partitions` partitions.
    #[must_use]
    pub fn new(partitions: i32) -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                partitions,
                log: Mutex::new(Vec::new()),
                next_offset: Mutex::new(HashMap::new()),
                sender,
            }),
        }
    }

    /// Hand out a producer writing onto this bus.
    #[must_use]
    pub fn producer(&self) -> InMemoryEventProducer {
        InMemoryEventProducer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Hand out a fresh consumer reading from this bus. Each consumer
    /// replays everything already published, then receives new records live,
    /// matching a Kafka consumer group starting from the earliest offset.
    #[must_use]
    pub fn consumer(&self) -> InMemoryEventConsumer {
        InMemoryEventConsumer {
            inner: Arc::clone(&self.inner),
            group_id: OnceLock::new(),
            committed: Mutex::new(HashMap::new()),
        }
    }

    /// Every record published so far, in publish order. Useful for
    /// assertions that don't go through a consumer.
    #[must_use]
    pub fn published(&self) -> Vec<EnrichedChatEvent> {
        self.inner.log.lock().expect("log mutex poisoned").clone()
    }
}

fn partition_for(scope_key: &str, partitions: i32) -> i32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    scope_key.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as i32
}

/// Writes onto an [`InMemoryEventBus`].
pub struct InMemoryEventProducer {
    inner: Arc<Inner>,
}

impl EventProducer for InMemoryEventProducer {
    fn publish(
        &self,
        scope: &ScopeKey,
        event: &ChatEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(i32, i64), EventBusError>> + Send + '_>> {
        let partition = partition_for(&scope.canonical(), self.inner.partitions);
        let event = event.clone();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let offset = {
                let mut next = inner.next_offset.lock().expect("offset mutex poisoned");
                let slot = next.entry(partition).or_insert(0);
                let offset = *slot;
                *slot += 1;
                offset
            };
            let enriched = EnrichedChatEvent::new(event, partition, offset);
            inner
                .log
                .lock()
                .expect("log mutex poisoned")
                .push(enriched.clone());
            let _ = inner.sender.send(enriched);
            Ok((partition, offset))
        })
    }
}

/// Reads from an [`InMemoryEventBus`] under one consumer group. Bound to its
/// group on the first [`EventConsumer::subscribe`] call, mirroring
/// `RedpandaEventConsumer`'s single-subscribe design.
pub struct InMemoryEventConsumer {
    inner: Arc<Inner>,
    group_id: OnceLock<String>,
    committed: Mutex<HashMap<i32, i64>>,
}

impl InMemoryEventConsumer {
    /// The last committed offset for `partition`, if any commit has landed.
    #[must_use]
    pub fn committed_offset(&self, partition: i32) -> Option<i64> {
        self.committed
            .lock()
            .expect("committed mutex poisoned")
            .get(&partition)
            .copied()
    }
}

impl EventConsumer for InMemoryEventConsumer {
    fn subscribe(
        &self,
        group_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            self.group_id
                .set(group_id)
                .map_err(|_| EventBusError::SubscribeFailed {
                    reason: "subscribe called more than once".to_string(),
                })?;

            let backlog = self.inner.log.lock().expect("log mutex poisoned").clone();
            let mut receiver = self.inner.sender.subscribe();

            let stream = async_stream::stream! {
                for record in backlog {
                    yield Ok(record);
                }
                loop {
                    match receiver.recv().await {
                        Ok(record) => yield Ok(record),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }

    fn commit(
        &self,
        record: &EnrichedChatEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let partition = record.partition;
        let offset = record.offset;
        Box::pin(async move {
            self.committed
                .lock()
                .expect("committed mutex poisoned")
                .insert(partition, offset);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatify_core::scope::{ScopeId, ScopeType};
    use chrono::Utc;
    use futures::StreamExt;

    fn scope() -> ScopeKey {
        ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("scope-1"))
    }

    fn event(text: &str) -> ChatEvent {
        ChatEvent::new(
            uuid::Uuid::new_v4(),
            &scope(),
            "user-a",
            text,
            Utc::now(),
            "pod-1",
        )
    }

    #[tokio::test]
    async fn partition_assignment_is_deterministic_across_producers() {
        let bus = InMemoryEventBus::new(8);
        let (p1, p2) = (bus.producer(), bus.producer());
        let (partition_a, _) = p1.publish(&scope(), &event("a")).await.expect("publish");
        let (partition_b, _) = p2.publish(&scope(), &event("b")).await.expect("publish");
        assert_eq!(partition_a, partition_b);
    }

    #[tokio::test]
    async fn consumer_replays_backlog_then_new_records_in_order() {
        let bus = InMemoryEventBus::new(1);
        let producer = bus.producer();
        producer.publish(&scope(), &event("m1")).await.expect("publish");

        let consumer = bus.consumer();
        let mut stream = consumer.subscribe("group-a").await.expect("subscribe");

        producer.publish(&scope(), &event("m2")).await.expect("publish");

        let first = stream.next().await.expect("item").expect("ok");
        let second = stream.next().await.expect("item").expect("ok");
        assert_eq!(first.event.text, "m1");
        assert_eq!(second.event.text, "m2");
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
    }

    #[tokio::test]
    async fn subscribe_twice_on_same_consumer_fails() {
        let bus = InMemoryEventBus::new(1);
        let consumer = bus.consumer();
        consumer.subscribe("group-a").await.expect("first subscribe");
        let err = consumer.subscribe("group-a").await.unwrap_err();
        assert!(matches!(err, EventBusError::SubscribeFailed { .. }));
    }

    #[tokio::test]
    async fn commit_tracks_latest_offset_per_partition() {
        let bus = InMemoryEventBus::new(1);
        let producer = bus.producer();
        producer.publish(&scope(), &event("m1")).await.expect("publish");
        let consumer = bus.consumer();
        let mut stream = consumer.subscribe("group-a").await.expect("subscribe");
        let record = stream.next().await.expect("item").expect("ok");
        consumer.commit(&record).await.expect("commit");
        assert_eq!(consumer.committed_offset(record.partition), Some(0));
    }
}
