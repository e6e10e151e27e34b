//! In-memory columnar store, standing in for `chatify-columnar`'s
//! ScyllaDB-backed implementation in tests (§8 property 3, scenario S4).

use chatify_core::columnar::{ColumnarStore, ColumnarStoreError, HistoryReader};
use chatify_core::event::ChatEvent;
use chatify_core::scope::ScopeKey;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use uuid::Uuid;

struct Table {
    rows: HashMap<String, Vec<ChatEvent>>,
    seen_message_ids: HashSet<Uuid>,
}

/// Append-only store keyed by scope, deduplicating on `message_id` exactly
/// as the real `ColumnarStore::append` contract requires.
pub struct InMemoryColumnarStore {
    table: Mutex<Table>,
}

impl Default for InMemoryColumnarStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryColumnarStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                rows: HashMap::new(),
                seen_message_ids: HashSet::new(),
            }),
        }
    }

    /// Total number of rows stored across all scopes, for test assertions.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.table
            .lock()
            .expect("table mutex poisoned")
            .rows
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl ColumnarStore for InMemoryColumnarStore {
    fn append(
        &self,
        scope: &ScopeKey,
        event: &ChatEvent,
        _broker_partition: Option<i32>,
        _broker_offset: Option<i64>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ColumnarStoreError>> + Send + '_>> {
        let key = scope.canonical();
        let event = event.clone();
        Box::pin(async move {
            let mut table = self.table.lock().expect("table mutex poisoned");
            if !table.seen_message_ids.insert(event.message_id) {
                return Ok(());
            }
            table.rows.entry(key).or_default().push(event);
            Ok(())
        })
    }
}

impl HistoryReader for InMemoryColumnarStore {
    fn query_by_scope(
        &self,
        scope: &ScopeKey,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatEvent>, ColumnarStoreError>> + Send + '_>> {
        let key = scope.canonical();
        Box::pin(async move {
            let table = self.table.lock().expect("table mutex poisoned");
            let mut rows = table.rows.get(&key).cloned().unwrap_or_default();
            rows.sort_by_key(|e| e.created_at_utc);
            let filtered = rows
                .into_iter()
                .filter(|e| from.is_none_or(|from| e.created_at_utc >= from))
                .filter(|e| to.is_none_or(|to| e.created_at_utc <= to))
                .take(limit as usize)
                .collect();
            Ok(filtered)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatify_core::scope::{ScopeId, ScopeType};

    fn scope() -> ScopeKey {
        ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("scope-2"))
    }

    fn event(message_id: Uuid, text: &str) -> ChatEvent {
        ChatEvent::new(message_id, &scope(), "user-c", text, Utc::now(), "pod-1")
    }

    #[tokio::test]
    async fn append_is_idempotent_on_message_id() {
        let store = InMemoryColumnarStore::new();
        let id = Uuid::new_v4();
        store.append(&scope(), &event(id, "m1"), Some(0), Some(0)).await.expect("append");
        store.append(&scope(), &event(id, "m1"), Some(0), Some(0)).await.expect("append again");
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn query_returns_ascending_by_created_at() {
        let store = InMemoryColumnarStore::new();
        store.append(&scope(), &event(Uuid::new_v4(), "m2"), None, None).await.expect("append");
        store.append(&scope(), &event(Uuid::new_v4(), "m1"), None, None).await.expect("append");
        let rows = store
            .query_by_scope(&scope(), None, None, 10)
            .await
            .expect("query");
        let mut sorted = rows.clone();
        sorted.sort_by_key(|e| e.created_at_utc);
        assert_eq!(rows, sorted);
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let store = InMemoryColumnarStore::new();
        for i in 0..5 {
            store
                .append(&scope(), &event(Uuid::new_v4(), &format!("m{i}")), None, None)
                .await
                .expect("append");
        }
        let rows = store.query_by_scope(&scope(), None, None, 2).await.expect("query");
        assert_eq!(rows.len(), 2);
    }
}
