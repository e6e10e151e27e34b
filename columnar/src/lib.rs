//! # Chatify Columnar
//!
//! Scylla-backed [`ColumnarStore`] (C6 write path) and [`HistoryReader`]
//! (C8 read path) over the `chat_messages` table (§6).
//!
//! The teacher workspace's durable store was Postgres via `sqlx`; the
//! wide, clustering-key-ordered `chat_messages` schema §6 specifies is a
//! columnar/wide-row shape, not a relational one, so this crate swaps in
//! `scylla` (a Cassandra-protocol driver) instead of generalizing the
//! teacher's Postgres projection store. See `DESIGN.md` for the full
//! rationale.
//!
//! ```text
//! CREATE TABLE chat_messages (
//!     scope_id text, created_at_utc timestamp, message_id uuid,
//!     sender_id text, text text, origin_pod_id text,
//!     broker_partition int, broker_offset bigint,
//!     PRIMARY KEY ((scope_id), created_at_utc, message_id)
//! ) WITH CLUSTERING ORDER BY (created_at_utc ASC);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chatify_core::columnar::{ColumnarStore, ColumnarStoreError, HistoryReader};
use chatify_core::event::ChatEvent;
use chatify_core::scope::{ScopeKey, ScopeType};
use chrono::{DateTime, Utc};
use scylla::frame::value::CqlTimestamp;
use scylla::statement::Consistency;
use scylla::transport::errors::QueryError;
use scylla::{Session, SessionBuilder};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

const APPEND_CQL: &str = "INSERT INTO chat_messages \
    (scope_id, created_at_utc, message_id, sender_id, text, origin_pod_id, broker_partition, broker_offset) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS";

const QUERY_RANGE_CQL: &str = "SELECT scope_id, created_at_utc, message_id, sender_id, text, origin_pod_id \
    FROM chat_messages WHERE scope_id = ? AND created_at_utc >= ? AND created_at_utc <= ? \
    LIMIT ?";

/// Whether a transport-level error from the driver is worth retrying (§4.4
/// step 4: connection failure, no host available, query timeout, general
/// network) versus a permanent one. Classification is by variant from the
/// driver's own error type, never by matching on the error's message text
/// (Design Notes §9).
#[must_use]
pub fn is_transient(error: &QueryError) -> bool {
    matches!(
        error,
        QueryError::IoError(_)
            | QueryError::ConnectionPoolError(_)
            | QueryError::RequestTimeout(_)
            | QueryError::TimeoutError
            | QueryError::DbError(scylla::transport::errors::DbError::Overloaded, _)
            | QueryError::DbError(scylla::transport::errors::DbError::Unavailable { .. }, _)
    )
}

/// Scylla-backed [`ColumnarStore`] and [`HistoryReader`].
///
/// Both traits are implemented on the same handle because both ultimately
/// issue prepared CQL statements over the same `Session`; production
/// deployments may still run the writer-side and reader-side in separate
/// pods, each holding its own instance.
pub struct ScyllaColumnarStore {
    session: Arc<Session>,
    append_statement: scylla::prepared_statement::PreparedStatement,
    query_statement: scylla::prepared_statement::PreparedStatement,
}

impl ScyllaColumnarStore {
    /// Connect to the cluster at `contact_points`, using `keyspace` as the
    /// current keyspace for unqualified table names, and prepare the two
    /// statements this store issues.
    ///
    /// Per §4.4/§4.8, appends run at `LocalQuorum` and range reads at
    /// `LocalOne`.
    ///
    /// # Errors
    ///
    /// Returns [`ColumnarStoreError::Unavailable`] if no node in
    /// `contact_points` could be reached, or preparing either statement
    /// failed.
    pub async fn connect(contact_points: &str, keyspace: &str) -> Result<Self, ColumnarStoreError> {
        let known_nodes: Vec<&str> = contact_points.split(',').map(str::trim).collect();
        let session = SessionBuilder::new()
            .known_nodes(&known_nodes)
            .use_keyspace(keyspace, false)
            .build()
            .await
            .map_err(|e| ColumnarStoreError::Unavailable(e.to_string()))?;

        let mut append_statement = session
            .prepare(APPEND_CQL)
            .await
            .map_err(|e| ColumnarStoreError::Unavailable(e.to_string()))?;
        append_statement.set_consistency(Consistency::LocalQuorum);

        let mut query_statement = session
            .prepare(QUERY_RANGE_CQL)
            .await
            .map_err(|e| ColumnarStoreError::Unavailable(e.to_string()))?;
        query_statement.set_consistency(Consistency::LocalOne);

        Ok(Self {
            session: Arc::new(session),
            append_statement,
            query_statement,
        })
    }
}

impl ColumnarStore for ScyllaColumnarStore {
    fn append(
        &self,
        scope: &ScopeKey,
        event: &ChatEvent,
        broker_partition: Option<i32>,
        broker_offset: Option<i64>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ColumnarStoreError>> + Send + '_>> {
        let scope_id = scope.canonical();
        let event = event.clone();

        Box::pin(async move {
            let created_at = CqlTimestamp(event.created_at_utc.timestamp_millis());
            self.session
                .execute_unpaged(
                    &self.append_statement,
                    (
                        scope_id,
                        created_at,
                        event.message_id,
                        event.sender_id,
                        event.text,
                        event.origin_pod_id,
                        broker_partition,
                        broker_offset,
                    ),
                )
                .await
                .map_err(|e| {
                    if is_transient(&e) {
                        ColumnarStoreError::Unavailable(e.to_string())
                    } else {
                        ColumnarStoreError::WriteFailed(e.to_string())
                    }
                })?;
            Ok(())
        })
    }
}

impl HistoryReader for ScyllaColumnarStore {
    fn query_by_scope(
        &self,
        scope: &ScopeKey,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatEvent>, ColumnarStoreError>> + Send + '_>> {
        let scope_id = scope.canonical();
        let scope_type = scope.scope_type;

        Box::pin(async move {
            let from_ts = CqlTimestamp(from.map_or(0, |t| t.timestamp_millis()));
            let to_ts = CqlTimestamp(to.map_or(i64::MAX, |t| t.timestamp_millis()));

            let result = self
                .session
                .execute_unpaged(
                    &self.query_statement,
                    (scope_id, from_ts, to_ts, i32::try_from(limit).unwrap_or(i32::MAX)),
                )
                .await
                .map_err(|e| ColumnarStoreError::Unavailable(e.to_string()))?;

            let rows_result = result
                .into_rows_result()
                .map_err(|e| ColumnarStoreError::DecodeFailed(e.to_string()))?;

            let typed_rows: Vec<RawRow> = rows_result
                .rows::<RawRow>()
                .map_err(|e| ColumnarStoreError::DecodeFailed(e.to_string()))?
                .collect::<Result<_, _>>()
                .map_err(|e| ColumnarStoreError::DecodeFailed(e.to_string()))?;

            typed_rows
                .into_iter()
                .map(|row| decode_row(row, scope_type))
                .collect()
        })
    }
}

type RawRow = (String, CqlTimestamp, Uuid, String, String, String);

fn decode_row(row: RawRow, scope_type: ScopeType) -> Result<ChatEvent, ColumnarStoreError> {
    let (scope_id_col, created_at, message_id, sender_id, text, origin_pod_id) = row;

    let created_at_utc = DateTime::<Utc>::from_timestamp_millis(created_at.0)
        .ok_or_else(|| ColumnarStoreError::DecodeFailed("timestamp out of range".to_string()))?;

    let (_, scope_id) = scope_id_col
        .split_once(':')
        .ok_or_else(|| ColumnarStoreError::DecodeFailed(format!("malformed scope_id: {scope_id_col}")))?;

    Ok(ChatEvent {
        message_id,
        scope_type,
        scope_id: scope_id.to_string(),
        sender_id,
        text,
        created_at_utc,
        origin_pod_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_transient_classifies_timeout_as_retryable() {
        assert!(is_transient(&QueryError::TimeoutError));
    }

    #[test]
    fn is_transient_classifies_invalid_message_as_permanent() {
        let error = QueryError::InvalidMessage("bad query".to_string());
        assert!(!is_transient(&error));
    }
}
