//! Broadcast Consumer (C5): the per-pod loop that turns log records back
//! into pushes to locally-held connections.
//!
//! One instance runs per pod, subscribed under its own unique consumer
//! group (`chatify-broadcast-{pod_id}`, per §4.3) so every pod independently
//! observes every partition and can fan a message out to whichever of its
//! own connections are joined to that message's scope.

use chatify_core::delivery::{ConnectionSink, DeliveryError};
use chatify_core::event_bus::{EventBusError, EventConsumer};
use chatify_core::registry::ScopeRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::metrics::BroadcastMetrics;

/// Commit offsets at least this often even if the record-count threshold
/// hasn't been reached, per §4.3.
const COMMIT_INTERVAL: Duration = Duration::from_secs(5);

/// Commit offsets after this many consumed records even if the interval
/// hasn't elapsed, per §4.3.
const COMMIT_RECORD_THRESHOLD: usize = 500;

/// Drives one pod's broadcast consumer group: consume, fan out to local
/// connections via [`ConnectionSink`], commit in batches.
pub struct BroadcastConsumerLoop {
    consumer: Arc<dyn EventConsumer>,
    registry: Arc<ScopeRegistry>,
    sink: Arc<dyn ConnectionSink>,
}

impl BroadcastConsumerLoop {
    /// Construct a loop from its injected dependencies.
    #[must_use]
    pub fn new(
        consumer: Arc<dyn EventConsumer>,
        registry: Arc<ScopeRegistry>,
        sink: Arc<dyn ConnectionSink>,
    ) -> Self {
        Self {
            consumer,
            registry,
            sink,
        }
    }

    /// Subscribe under `group_id` (this pod's broadcast group, e.g.
    /// `chatify-broadcast-{pod_id}`) and run until `cancellation` fires.
    ///
    /// For each consumed record: look up the scope's locally-joined
    /// connections and deliver to each independently, never letting one
    /// failed delivery stop the others or stall the partition (§4.3, §4.5).
    /// Offsets are committed every [`COMMIT_INTERVAL`] or every
    /// [`COMMIT_RECORD_THRESHOLD`] records, whichever comes first, plus once
    /// more on graceful shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscribeFailed`] if the initial subscribe
    /// could not be established. Per-record delivery and commit failures are
    /// logged and do not end the loop.
    pub async fn run(
        &self,
        group_id: &str,
        cancellation: CancellationToken,
    ) -> Result<(), EventBusError> {
        use futures::StreamExt;

        let mut stream = self.consumer.subscribe(group_id).await?;
        let mut pending_since_commit = 0usize;
        let mut commit_ticker = tokio::time::interval(COMMIT_INTERVAL);
        let mut last_record: Option<chatify_core::event::EnrichedChatEvent> = None;

        loop {
            tokio::select! {
                biased;

                () = cancellation.cancelled() => {
                    if let Some(record) = &last_record {
                        if let Err(e) = self.consumer.commit(record).await {
                            tracing::error!(error = %e, "final commit on shutdown failed");
                        }
                    }
                    tracing::info!(%group_id, "broadcast consumer shutting down");
                    return Ok(());
                }

                _ = commit_ticker.tick() => {
                    if pending_since_commit > 0 {
                        if let Some(record) = &last_record {
                            if let Err(e) = self.consumer.commit(record).await {
                                tracing::error!(error = %e, "periodic commit failed");
                            } else {
                                pending_since_commit = 0;
                            }
                        }
                    }
                }

                item = stream.next() => {
                    let Some(item) = item else {
                        tracing::warn!(%group_id, "broadcast stream ended");
                        return Ok(());
                    };
                    let record = match item {
                        Ok(record) => record,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to consume record");
                            continue;
                        }
                    };

                    self.deliver(&record).await;
                    pending_since_commit += 1;
                    last_record = Some(record);

                    if pending_since_commit >= COMMIT_RECORD_THRESHOLD {
                        if let Some(record) = &last_record {
                            if let Err(e) = self.consumer.commit(record).await {
                                tracing::error!(error = %e, "threshold commit failed");
                            } else {
                                pending_since_commit = 0;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn deliver(&self, record: &chatify_core::event::EnrichedChatEvent) {
        let Ok(scope) = record.event.scope_key() else {
            tracing::error!(scope_id = %record.event.scope_id, "record has unparseable scope id, dropping");
            return;
        };
        for connection_id in self.registry.members_of(&scope) {
            match self.sink.deliver(&connection_id, &scope, &record.event).await {
                Ok(()) => BroadcastMetrics::record_delivered(),
                Err(DeliveryError::Timeout | DeliveryError::Closed) => {
                    BroadcastMetrics::record_dropped();
                }
            }
        }
    }
}
