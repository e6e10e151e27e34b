//! Columnar store contracts: the write side used by the History Writer (C6)
//! and the read side used by the History Reader (C8).
//!
//! Split into two traits because they are implemented by different pods in
//! production (C6 runs in the writer fleet, C8 in the query-serving fleet)
//! even though both point at the same backing table.

use crate::event::ChatEvent;
use crate::scope::ScopeKey;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by the columnar store.
#[derive(Error, Debug, Clone)]
pub enum ColumnarStoreError {
    /// The store could not be reached.
    #[error("columnar store unavailable: {0}")]
    Unavailable(String),

    /// A write failed for a reason other than unavailability (e.g. a schema
    /// mismatch).
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A stored row failed to decode back into a [`ChatEvent`].
    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// Appends durable history rows (C6's store-side dependency).
///
/// `append` must be idempotent under `message_id`: the History Writer may
/// redeliver the same event after a crash mid-commit, and a second append of
/// an already-stored `message_id` must be a no-op rather than a duplicate
/// row or an error.
pub trait ColumnarStore: Send + Sync {
    /// Durably append `event` under `scope`, with the broker coordinates it
    /// was consumed at, deduplicating on `event.message_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ColumnarStoreError::Unavailable`] if the store could not be
    /// reached, or [`ColumnarStoreError::WriteFailed`] for any other write
    /// failure.
    fn append(
        &self,
        scope: &ScopeKey,
        event: &ChatEvent,
        broker_partition: Option<i32>,
        broker_offset: Option<i64>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ColumnarStoreError>> + Send + '_>>;
}

/// Serves range queries over scope timelines (C8).
///
/// Per §4.8, results are returned in ascending `created_at_utc` order;
/// pagination is cursor-based on that same field — the caller passes the
/// last seen timestamp back in as the next call's `from`.
pub trait HistoryReader: Send + Sync {
    /// Fetch up to `limit` messages for `scope` with
    /// `from <= created_at_utc <= to` (either bound optional), ascending by
    /// `created_at_utc`.
    ///
    /// # Errors
    ///
    /// Returns [`ColumnarStoreError::Unavailable`] if the store could not be
    /// reached, or [`ColumnarStoreError::DecodeFailed`] if a stored row was
    /// corrupt.
    fn query_by_scope(
        &self,
        scope: &ScopeKey,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatEvent>, ColumnarStoreError>> + Send + '_>>;
}
