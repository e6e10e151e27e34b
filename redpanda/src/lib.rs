//! Redpanda-backed log transport for Chatify.
//!
//! Implements [`EventProducer`] (C4) and [`EventConsumer`] (the shared
//! primitive behind both C5's per-pod broadcast groups and C6's single
//! durable writer group) using `rdkafka`, a Kafka-compatible client.
//! Redpanda itself is just the deployment target; anything speaking the
//! Kafka wire protocol works.
//!
//! # Delivery semantics
//!
//! The producer is configured for `acks=all` with the idempotent producer
//! enabled, giving exactly-once-per-partition publish semantics (§4.2).
//! Consumers commit offsets manually, only after the caller has finished
//! processing a record, so a crash mid-processing redelivers rather than
//! silently drops (§4.3, §4.4).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chatify_core::event::{ChatEvent, EnrichedChatEvent};
use chatify_core::event_bus::{EventBusError, EventConsumer, EventProducer, EventStream};
use chatify_core::scope::ScopeKey;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::util::Timeout;
use rdkafka::Offset;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

/// Publishes [`ChatEvent`]s onto a Kafka-compatible log (C4).
///
/// One instance is held per pod behind a `tokio::sync::OnceCell` at the call
/// site (see `chatify_runtime::send_pipeline`) — the once-cell replaces the
/// double-checked-locking singleton pattern the Design Notes flag as
/// needing re-architecting.
pub struct RedpandaEventProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl RedpandaEventProducer {
    /// Connect a producer to `bootstrap_servers`, publishing to `topic`.
    ///
    /// Configures `enable.idempotence=true`, `acks=all`, unbounded retries,
    /// `snappy` compression, and a 5ms linger to coalesce bursts, per §4.2.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer could not
    /// be constructed.
    pub fn connect(
        bootstrap_servers: &str,
        topic: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EventBusError> {
        let topic = topic.into();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "2147483647")
            .set("compression.type", "snappy")
            .set("linger.ms", "5")
            .create()
            .map_err(|e| EventBusError::ConnectionFailed(format!("producer create failed: {e}")))?;

        tracing::info!(bootstrap_servers, %topic, "redpanda producer connected");
        Ok(Self {
            producer,
            topic,
            timeout,
        })
    }
}

impl EventProducer for RedpandaEventProducer {
    fn publish(
        &self,
        scope: &ScopeKey,
        event: &ChatEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(i32, i64), EventBusError>> + Send + '_>> {
        let key = scope.canonical();
        let event = event.clone();

        Box::pin(async move {
            let payload = serde_json::to_vec(&event).map_err(|e| EventBusError::PublishFailed {
                scope: key.clone(),
                reason: format!("serialize failed: {e}"),
            })?;

            let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(scope = %key, partition, offset, "event published");
                    Ok((partition, offset))
                }
                Err((kafka_error, _)) => {
                    tracing::error!(scope = %key, error = %kafka_error, "publish failed");
                    Err(EventBusError::PublishFailed {
                        scope: key,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }
}

/// Consumes [`ChatEvent`]s from a Kafka-compatible log under a named
/// consumer group.
///
/// The same type backs both C5 (caller passes a per-pod unique group id so
/// every pod independently reads every partition) and C6 (caller passes one
/// shared group id so partitions are load-balanced across writer
/// instances); the distinction lives entirely in the `group_id` argument to
/// [`RedpandaEventConsumer::subscribe`].
pub struct RedpandaEventConsumer {
    bootstrap_servers: String,
    topic: String,
    consumer: OnceLock<Arc<StreamConsumer>>,
}

impl RedpandaEventConsumer {
    /// Point a consumer at `bootstrap_servers`/`topic`. No connection is
    /// established until [`RedpandaEventConsumer::subscribe`] is called.
    #[must_use]
    pub fn new(bootstrap_servers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            topic: topic.into(),
            consumer: OnceLock::new(),
        }
    }
}

impl EventConsumer for RedpandaEventConsumer {
    fn subscribe(
        &self,
        group_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let group_id = group_id.to_string();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &self.bootstrap_servers)
                .set("group.id", &group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", "latest")
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscribeFailed {
                    reason: format!("consumer create failed: {e}"),
                })?;

            consumer
                .subscribe(&[self.topic.as_str()])
                .map_err(|e| EventBusError::SubscribeFailed {
                    reason: format!("subscribe failed: {e}"),
                })?;

            tracing::info!(%group_id, topic = %self.topic, "subscribed to chat events");

            let consumer = Arc::new(consumer);
            self.consumer
                .set(Arc::clone(&consumer))
                .map_err(|_| EventBusError::SubscribeFailed {
                    reason: "subscribe called more than once".to_string(),
                })?;

            let (tx, rx) = tokio::sync::mpsc::channel(1000);
            let consumer_for_task = Arc::clone(&consumer);

            tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = consumer_for_task.stream();
                while let Some(msg_result) = stream.next().await {
                    let item = match msg_result {
                        Ok(message) => decode_record(&message),
                        Err(e) => Err(EventBusError::Transport(e.to_string())),
                    };
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
                tracing::debug!("redpanda consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
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
        let topic = self.topic.clone();

        Box::pin(async move {
            let Some(consumer) = self.consumer.get() else {
                return Err(EventBusError::CommitFailed(
                    "commit called before subscribe".to_string(),
                ));
            };
            let mut tpl = TopicPartitionList::new();
            tpl.add_partition_offset(&topic, partition, Offset::Offset(offset + 1))
                .map_err(|e| EventBusError::CommitFailed(e.to_string()))?;
            consumer
                .commit(&tpl, CommitMode::Async)
                .map_err(|e| EventBusError::CommitFailed(e.to_string()))
        })
    }
}

fn decode_record(
    message: &rdkafka::message::BorrowedMessage<'_>,
) -> Result<EnrichedChatEvent, EventBusError> {
    let payload = message
        .payload()
        .ok_or_else(|| EventBusError::DeserializationFailed("message has no payload".to_string()))?;
    let event: ChatEvent = serde_json::from_slice(payload)
        .map_err(|e| EventBusError::DeserializationFailed(e.to_string()))?;
    Ok(EnrichedChatEvent::new(event, message.partition(), message.offset()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_and_consumer_are_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<RedpandaEventProducer>();
        assert_sync::<RedpandaEventProducer>();
        assert_send::<RedpandaEventConsumer>();
        assert_sync::<RedpandaEventConsumer>();
    }
}
