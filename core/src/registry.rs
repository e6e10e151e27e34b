//! Scope Registry (C1): per-pod in-memory map of scope → local connections.
//!
//! `DashMap`/`DashSet` give lock-free-ish concurrent read/write access
//! without a single coarse mutex, matching how the rest of this workspace
//! reaches for `dashmap` wherever a shared mutable map needs concurrent
//! access without a dedicated actor task.

use crate::connection::{Connection, ConnectionId};
use crate::scope::ScopeKey;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

/// Per-pod mapping of scope → set of locally-held connections (§4.5).
///
/// `Broadcast` takes a snapshot of the current member set before delivering,
/// so iteration is safe under concurrent `Join`/`Leave` — a connection that
/// joins mid-broadcast simply won't receive that one delivery, and one that
/// leaves mid-broadcast may receive a delivery addressed just before it left.
/// Both are acceptable under the at-least-once delivery model.
pub struct ScopeRegistry {
    scopes: DashMap<ScopeKey, DashSet<ConnectionId>>,
    connections: DashMap<ConnectionId, ConnectionState>,
}

struct ConnectionState {
    connection: Connection,
    joined_scopes: DashSet<ScopeKey>,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    /// Register `connection` as having joined `scope`, creating the scope's
    /// member set if this is its first member.
    pub fn join(&self, connection: Connection, scope: ScopeKey) {
        let connection_id = connection.connection_id.clone();
        self.connections
            .entry(connection_id.clone())
            .or_insert_with(|| ConnectionState {
                connection,
                joined_scopes: DashSet::new(),
            })
            .joined_scopes
            .insert(scope.clone());
        self.scopes
            .entry(scope)
            .or_default()
            .insert(connection_id);
    }

    /// Remove `connection_id` from `scope`'s member set. If the set becomes
    /// empty, the scope entry is dropped entirely.
    pub fn leave(&self, connection_id: &ConnectionId, scope: &ScopeKey) {
        if let Some(state) = self.connections.get(connection_id) {
            state.joined_scopes.remove(scope);
        }
        if let Some(members) = self.scopes.get(scope) {
            members.remove(connection_id);
            let is_empty = members.is_empty();
            drop(members);
            if is_empty {
                self.scopes.remove(scope);
            }
        }
    }

    /// Remove `connection_id` from every scope it had joined, and forget the
    /// connection entirely. Called on disconnect. Cost is
    /// `O(|connection.joined_scopes|)`.
    ///
    /// Invariant: after this returns, `connection_id` appears in no scope's
    /// member set.
    pub fn leave_all(&self, connection_id: &ConnectionId) {
        let Some((_, state)) = self.connections.remove(connection_id) else {
            return;
        };
        for scope in &state.joined_scopes {
            let scope_key: &ScopeKey = &scope;
            if let Some(members) = self.scopes.get(scope_key) {
                members.remove(connection_id);
                let is_empty = members.is_empty();
                drop(members);
                if is_empty {
                    self.scopes.remove(scope_key);
                }
            }
        }
    }

    /// Snapshot the connection ids currently joined to `scope`, for delivery
    /// by a broadcast consumer. Taking an owned snapshot (rather than
    /// holding a reference into the map) lets the caller deliver without
    /// holding any lock on the registry.
    #[must_use]
    pub fn members_of(&self, scope: &ScopeKey) -> Vec<ConnectionId> {
        self.scopes
            .get(scope)
            .map(|members| members.iter().map(|entry| (*entry).clone()).collect())
            .unwrap_or_default()
    }

    /// Look up the live [`Connection`] for a connection id, if it is still
    /// registered.
    #[must_use]
    pub fn connection(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .get(connection_id)
            .map(|state| Arc::new(state.connection.clone()))
    }

    /// Number of distinct scopes with at least one local member. Exposed for
    /// metrics/diagnostics.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::UserId;
    use crate::scope::{ScopeId, ScopeType};

    fn scope(id: &str) -> ScopeKey {
        ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked(id))
    }

    fn conn(id: &str) -> Connection {
        Connection::new(ConnectionId::new(id), UserId::new("user-a"))
    }

    #[test]
    fn join_then_members_of_contains_connection() {
        let registry = ScopeRegistry::new();
        let scope_key = scope("s1");
        registry.join(conn("c1"), scope_key.clone());
        assert_eq!(registry.members_of(&scope_key), vec![ConnectionId::new("c1")]);
    }

    #[test]
    fn leave_removes_connection_and_drops_empty_scope() {
        let registry = ScopeRegistry::new();
        let scope_key = scope("s1");
        registry.join(conn("c1"), scope_key.clone());
        registry.leave(&ConnectionId::new("c1"), &scope_key);
        assert!(registry.members_of(&scope_key).is_empty());
        assert_eq!(registry.scope_count(), 0);
    }

    #[test]
    fn leave_all_clears_every_joined_scope() {
        let registry = ScopeRegistry::new();
        let s1 = scope("s1");
        let s2 = scope("s2");
        registry.join(conn("c1"), s1.clone());
        registry.join(conn("c1"), s2.clone());
        registry.leave_all(&ConnectionId::new("c1"));
        assert!(registry.members_of(&s1).is_empty());
        assert!(registry.members_of(&s2).is_empty());
        assert!(registry.connection(&ConnectionId::new("c1")).is_none());
    }

    #[test]
    fn leave_all_on_unknown_connection_is_a_no_op() {
        let registry = ScopeRegistry::new();
        registry.leave_all(&ConnectionId::new("ghost"));
    }

    #[test]
    fn multiple_connections_share_a_scope() {
        let registry = ScopeRegistry::new();
        let scope_key = scope("s1");
        registry.join(conn("c1"), scope_key.clone());
        registry.join(conn("c2"), scope_key.clone());
        let mut members = registry.members_of(&scope_key);
        members.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(
            members,
            vec![ConnectionId::new("c1"), ConnectionId::new("c2")]
        );
    }
}
