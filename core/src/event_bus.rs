//! Event production and consumption contracts (C4/C5/C6).
//!
//! [`EventProducer`] is the single write path onto the log (C4). Two
//! distinct consumption shapes read from it: [`EventConsumer`] is used both
//! by the Broadcast Consumer (C5, one ephemeral per-pod group so every pod
//! sees every event) and the History Writer (C6, one shared durable group so
//! each event is written exactly once across the fleet) — the difference is
//! entirely in how the caller configures the consumer group, not in the
//! trait.
//!
//! Dyn compatibility mirrors the teacher's event bus trait: operations
//! return `Pin<Box<dyn Future<...> + Send>>` explicitly rather than using
//! `async fn`, so the traits can be stored as `Arc<dyn EventProducer>`.

use crate::event::{ChatEvent, EnrichedChatEvent};
use crate::scope::ScopeKey;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by the log transport.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Could not establish or maintain a connection to the broker.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A publish did not reach `acks=all` durability within the configured
    /// retry budget.
    #[error("publish failed for scope '{scope}': {reason}")]
    PublishFailed {
        /// The scope the publish targeted.
        scope: String,
        /// The reason for failure.
        reason: String,
    },

    /// Subscribing to the log (joining a consumer group) failed.
    #[error("subscribe failed: {reason}")]
    SubscribeFailed {
        /// The reason for failure.
        reason: String,
    },

    /// A consumed record's value did not deserialize as a [`ChatEvent`].
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Committing consumer offsets failed.
    #[error("offset commit failed: {0}")]
    CommitFailed(String),

    /// Any other transport-level failure not covered above.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Stream of consumed records, each independently fallible.
pub type EventStream =
    Pin<Box<dyn futures::Stream<Item = Result<EnrichedChatEvent, EventBusError>> + Send>>;

/// Publishes [`ChatEvent`]s onto the durable log (C4).
///
/// Implementations must be idempotent-producer configured and wait for
/// `acks=all` before resolving [`EventProducer::publish`] successfully, per
/// the at-least-once / exactly-once-per-partition guarantee the rest of the
/// system (C5, C6) is built on.
pub trait EventProducer: Send + Sync {
    /// Publish `event` to the log, keyed by `scope`'s canonical form so all
    /// messages for one scope land on the same partition and preserve
    /// publish order. Returns the `(partition, offset)` the broker assigned
    /// the record, per §4.2's `Produce(event) -> Result<(partition, offset)>`
    /// contract.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if durability could not be
    /// confirmed within the retry budget.
    fn publish(
        &self,
        scope: &ScopeKey,
        event: &ChatEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(i32, i64), EventBusError>> + Send + '_>>;
}

/// Consumes [`ChatEvent`]s from the log under a named consumer group (C5/C6).
///
/// The same trait backs both consumption shapes in the system: give each pod
/// its own unique group name for fan-out (C5, Broadcast Consumer), or share
/// one group name across the fleet for exactly-once durable writes (C6,
/// History Writer).
pub trait EventConsumer: Send + Sync {
    /// Subscribe under `group_id` and return a stream of consumed records.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscribeFailed`] if the subscription could
    /// not be established.
    fn subscribe(
        &self,
        group_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;

    /// Commit the offset for a consumed record, marking it (and everything
    /// before it in its partition) as processed for this consumer group.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::CommitFailed`] if the broker rejected the
    /// commit.
    fn commit(
        &self,
        record: &EnrichedChatEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;
}
