//! Presence Registry contract (C2): which `(pod, connection)` pairs a user
//! is currently reachable through, per `spec.md` §4.6.
//!
//! Backed by the shared key-value store so presence is visible fleet-wide,
//! unlike the Scope Registry (C1) which is strictly per-pod, in-memory.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the presence store.
#[derive(Error, Debug, Clone)]
pub enum PresenceError {
    /// The backing store could not be reached.
    #[error("presence store unavailable: {0}")]
    Unavailable(String),

    /// A stored record failed to decode.
    #[error("presence record decode failed: {0}")]
    DecodeFailed(String),
}

/// One connection currently registered as online for a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceRecord {
    /// The pod holding the connection.
    pub pod_id: String,
    /// The connection's identifier.
    pub connection_id: String,
}

/// Tracks, per user, the set of `(pod_id, connection_id)` pairs presently
/// online (§3: `presence[user_id] -> set<(pod_id, connection_id)>`, each
/// with a freshness score).
///
/// Every registration carries a TTL so a pod that crashes without calling
/// [`PresenceRegistry::set_offline`] ages out rather than leaking forever.
/// `set_online`/`heartbeat` are idempotent: calling either again for the
/// same `(user_id, connection_id)` simply refreshes the freshness score and
/// TTL.
pub trait PresenceRegistry: Send + Sync {
    /// Record `connection_id` (held by `pod_id`) as online for `user_id`,
    /// with the registry's configured time-to-live.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Unavailable`] if the store could not be
    /// reached.
    fn set_online(
        &self,
        user_id: &str,
        pod_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>>;

    /// Remove `connection_id`'s registration for `user_id` (called on
    /// disconnect). If this was the user's last connection, the presence
    /// key itself is deleted eagerly rather than left to expire.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Unavailable`] if the store could not be
    /// reached.
    fn set_offline(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>>;

    /// Refresh `connection_id`'s freshness score and TTL, equivalent to
    /// calling [`PresenceRegistry::set_online`] again. Callers should invoke
    /// this at an interval no greater than a quarter of the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Unavailable`] if the store could not be
    /// reached.
    fn heartbeat(
        &self,
        user_id: &str,
        pod_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>>;

    /// List the connections currently online for `user_id`, in ascending
    /// freshness-score order. A connection that has not been heart-beat
    /// within the TTL is absent.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Unavailable`] if the store could not be
    /// reached, or [`PresenceError::DecodeFailed`] if a stored record was
    /// corrupt.
    fn get_connections(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PresenceRecord>, PresenceError>> + Send + '_>>;
}

/// Placeholder for a future presence expiry sweep; not required by §4.6
/// since Redis TTLs handle expiry passively, kept here as the natural spot
/// to add one if active sweeping is ever needed.
pub const DEFAULT_HEARTBEAT_INTERVAL_FRACTION: u32 = 4;

/// The recommended heartbeat interval for a given TTL, per §4.6 (`≤ TTL/4`).
#[must_use]
pub fn recommended_heartbeat_interval(ttl: Duration) -> Duration {
    ttl / DEFAULT_HEARTBEAT_INTERVAL_FRACTION
}
