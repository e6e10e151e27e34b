//! Delivery hook: how the Broadcast Consumer (C5) hands an event to a local
//! connection's transport.
//!
//! The transport layer itself is out of scope; this trait is the seam the
//! (external) transport implements so [`crate::registry::ScopeRegistry`]'s
//! member snapshots can be turned into actual pushes without C1/C5 knowing
//! anything about websockets or framing.

use crate::connection::ConnectionId;
use crate::event::ChatEvent;
use crate::scope::ScopeKey;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Failure delivering to one connection. Per §4.3/§4.5, any of these cause
/// the broadcast consumer to drop that single delivery and continue —
/// never to stall the partition.
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// The connection's send buffer did not drain before the deadline.
    #[error("delivery timed out")]
    Timeout,

    /// The connection is already gone (disconnected after the snapshot was
    /// taken).
    #[error("connection closed")]
    Closed,
}

/// Pushes a `(scope, event)` pair to one local connection's transport.
pub trait ConnectionSink: Send + Sync {
    /// Deliver `event` (received under `scope`) to `connection_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the connection could not be reached in
    /// time or is already closed. Callers must treat this as a dropped
    /// delivery, not a reason to abort broadcasting to other connections.
    fn deliver(
        &self,
        connection_id: &ConnectionId,
        scope: &ScopeKey,
        event: &ChatEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>>;
}
