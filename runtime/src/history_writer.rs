//! History Writer (C6): the single shared consumer group that durably
//! appends every event to the columnar store exactly once across the fleet.
//!
//! Unlike the Broadcast Consumer, every pod running a History Writer shares
//! one consumer group id (`chatify-chat-history-writer`), so the log's
//! partitions are load-balanced across writer instances rather than each
//! instance seeing every record (§4.4).

use chatify_core::columnar::{ColumnarStore, ColumnarStoreError};
use chatify_core::event::EnrichedChatEvent;
use chatify_core::event_bus::{EventBusError, EventConsumer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::metrics::HistoryWriterMetrics;
use crate::retry::{retry_with_predicate, RetryPolicy};

/// Truncates a poison payload preview to at most this many bytes before
/// logging, so one oversized message can't flood the logs.
const DEFAULT_MAX_PAYLOAD_LOG_BYTES: usize = 256;

/// How long the loop pauses after a transient failure exhausts its retry
/// budget, before moving on to poll the next record (§4.4 step 4).
const TRANSIENT_FAILURE_PAUSE: std::time::Duration = std::time::Duration::from_secs(1);

/// What [`HistoryWriterLoop::process`] decided for one record, so `run` knows
/// whether to commit its offset.
enum ProcessOutcome {
    /// The record was durably appended, or was a permanent failure that was
    /// dead-lettered — either way its offset should be committed.
    Committed,
    /// A transient failure exhausted the retry budget; the offset must stay
    /// uncommitted so the record is re-read after the loop pauses.
    NotCommitted,
}

/// Routes permanently-failing (poison) events to a dead-letter sink instead
/// of stalling the partition they arrived on (§4.4 step 4).
pub trait DeadLetterSink: Send + Sync {
    /// Record that `record` could not be durably appended after exhausting
    /// retries, along with a truncated preview of its payload and the
    /// reason it was considered permanent.
    fn record(&self, record: &EnrichedChatEvent, reason: &str);
}

/// A [`DeadLetterSink`] that only logs; used when no durable dead-letter
/// table is configured.
#[derive(Default)]
pub struct LoggingDeadLetterSink {
    max_payload_log_bytes: usize,
}

impl LoggingDeadLetterSink {
    /// Construct a sink that truncates payload previews to `max_payload_log_bytes`.
    #[must_use]
    pub const fn new(max_payload_log_bytes: usize) -> Self {
        Self {
            max_payload_log_bytes,
        }
    }
}

impl DeadLetterSink for LoggingDeadLetterSink {
    fn record(&self, record: &EnrichedChatEvent, reason: &str) {
        let preview: String = record.event.text.chars().take(self.max_payload_log_bytes).collect();
        tracing::error!(
            message_id = %record.event.message_id,
            scope_id = %record.event.scope_id,
            partition = record.partition,
            offset = record.offset,
            reason,
            preview,
            "event dead-lettered after exhausting retries"
        );
    }
}

/// Drives the shared History Writer consumer group: consume, append with
/// retry, commit, or dead-letter on permanent failure.
pub struct HistoryWriterLoop {
    consumer: Arc<dyn EventConsumer>,
    store: Arc<dyn ColumnarStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    retry_policy: RetryPolicy,
}

impl HistoryWriterLoop {
    /// Construct a loop from its injected dependencies and retry policy.
    #[must_use]
    pub fn new(
        consumer: Arc<dyn EventConsumer>,
        store: Arc<dyn ColumnarStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            consumer,
            store,
            dead_letters,
            retry_policy,
        }
    }

    /// Subscribe under `group_id` (the shared writer group) and run until
    /// `cancellation` fires.
    ///
    /// For each consumed record, appends to the columnar store, retrying
    /// transient failures with backoff per the configured [`RetryPolicy`].
    /// A permanent failure (deserialize/missing-field, or a non-retryable
    /// append error) routes the record to the [`DeadLetterSink`] and commits
    /// its offset to skip the poison message. A transient failure that
    /// exhausts the retry budget does the opposite: the offset is left
    /// uncommitted and the loop pauses briefly before moving on, so the
    /// record is re-read rather than silently lost (§4.4 step 4, §7).
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscribeFailed`] if the initial subscribe
    /// could not be established.
    pub async fn run(
        &self,
        group_id: &str,
        cancellation: CancellationToken,
    ) -> Result<(), EventBusError> {
        use futures::StreamExt;

        let mut stream = self.consumer.subscribe(group_id).await?;

        loop {
            tokio::select! {
                biased;

                () = cancellation.cancelled() => {
                    tracing::info!(%group_id, "history writer shutting down");
                    return Ok(());
                }

                item = stream.next() => {
                    let Some(item) = item else {
                        tracing::warn!(%group_id, "history writer stream ended");
                        return Ok(());
                    };
                    let record = match item {
                        Ok(record) => record,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to consume record");
                            continue;
                        }
                    };

                    match self.process(&record).await {
                        ProcessOutcome::Committed => {
                            if let Err(e) = self.consumer.commit(&record).await {
                                tracing::error!(error = %e, "offset commit failed");
                            }
                        }
                        ProcessOutcome::NotCommitted => {
                            tracing::warn!(
                                %group_id,
                                message_id = %record.event.message_id,
                                "transient store failure exhausted retries, pausing without committing"
                            );
                            tokio::select! {
                                () = cancellation.cancelled() => {
                                    tracing::info!(%group_id, "history writer shutting down");
                                    return Ok(());
                                }
                                () = tokio::time::sleep(TRANSIENT_FAILURE_PAUSE) => {}
                            }
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, record: &EnrichedChatEvent) -> ProcessOutcome {
        let scope = match record.event.scope_key() {
            Ok(scope) => scope,
            Err(e) => {
                self.dead_letters.record(record, &format!("unparseable scope id: {e}"));
                HistoryWriterMetrics::record_dead_lettered();
                return ProcessOutcome::Committed;
            }
        };

        let result = retry_with_predicate(
            self.retry_policy.clone(),
            || {
                let store = Arc::clone(&self.store);
                let scope = scope.clone();
                let event = record.event.clone();
                async move {
                    store
                        .append(&scope, &event, Some(record.partition), Some(record.offset))
                        .await
                }
            },
            is_retryable,
        )
        .await;

        match result {
            Ok(()) => {
                HistoryWriterMetrics::record_write();
                ProcessOutcome::Committed
            }
            Err(e) if is_retryable(&e) => {
                // Exhausted the retry budget while the error stayed
                // transient: not a poison message, just an unreachable
                // store. Do not dead-letter it.
                HistoryWriterMetrics::record_write_failed();
                tracing::error!(
                    error = %e,
                    message_id = %record.event.message_id,
                    "append failed after exhausting retries on a transient error"
                );
                ProcessOutcome::NotCommitted
            }
            Err(e) => {
                HistoryWriterMetrics::record_write_failed();
                self.dead_letters.record(record, &e.to_string());
                HistoryWriterMetrics::record_dead_lettered();
                ProcessOutcome::Committed
            }
        }
    }
}

fn is_retryable(error: &ColumnarStoreError) -> bool {
    matches!(error, ColumnarStoreError::Unavailable(_))
}

impl Default for LoggingDeadLetterSink {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_LOG_BYTES)
    }
}
