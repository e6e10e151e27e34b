//! In-memory presence registry, standing in for `chatify-keyvalue`'s
//! Redis-backed implementation in tests (§8 property 6, scenario S6).

use chatify_core::clock::Clock;
use chatify_core::presence::{PresenceError, PresenceRecord, PresenceRegistry};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

struct Entry {
    record: PresenceRecord,
    last_seen: DateTime<Utc>,
}

/// Tracks `(pod_id, connection_id)` pairs per user with an injected clock, so
/// tests can fast-forward past a TTL instead of sleeping real seconds.
pub struct InMemoryPresenceRegistry {
    clock: Arc<dyn Clock>,
    ttl: ChronoDuration,
    entries: Mutex<HashMap<String, Vec<Entry>>>,
}

impl InMemoryPresenceRegistry {
    /// Construct a registry with the given time-to-live.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ttl: std::time::Duration) -> Self {
        Self {
            clock,
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::zero()),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn upsert(&self, user_id: &str, pod_id: &str, connection_id: &str) {
        let now = self.clock.now();
        let mut guard = self.entries.lock().expect("presence mutex poisoned");
        let connections = guard.entry(user_id.to_string()).or_default();
        if let Some(existing) = connections
            .iter_mut()
            .find(|e| e.record.connection_id == connection_id)
        {
            existing.last_seen = now;
            existing.record.pod_id = pod_id.to_string();
        } else {
            connections.push(Entry {
                record: PresenceRecord {
                    pod_id: pod_id.to_string(),
                    connection_id: connection_id.to_string(),
                },
                last_seen: now,
            });
        }
    }
}

impl PresenceRegistry for InMemoryPresenceRegistry {
    fn set_online(
        &self,
        user_id: &str,
        pod_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        self.upsert(user_id, pod_id, connection_id);
        Box::pin(async { Ok(()) })
    }

    fn set_offline(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        let mut guard = self.entries.lock().expect("presence mutex poisoned");
        if let Some(connections) = guard.get_mut(user_id) {
            connections.retain(|e| e.record.connection_id != connection_id);
            if connections.is_empty() {
                guard.remove(user_id);
            }
        }
        Box::pin(async { Ok(()) })
    }

    fn heartbeat(
        &self,
        user_id: &str,
        pod_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        self.upsert(user_id, pod_id, connection_id);
        Box::pin(async { Ok(()) })
    }

    fn get_connections(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PresenceRecord>, PresenceError>> + Send + '_>> {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut guard = self.entries.lock().expect("presence mutex poisoned");
        let result = if let Some(connections) = guard.get_mut(user_id) {
            connections.retain(|e| now - e.last_seen <= ttl);
            connections.sort_by_key(|e| (e.last_seen, e.record.connection_id.clone()));
            let records = connections.iter().map(|e| e.record.clone()).collect();
            if connections.is_empty() {
                guard.remove(user_id);
            }
            records
        } else {
            Vec::new()
        };
        Box::pin(async move { Ok(result) })
    }
}
