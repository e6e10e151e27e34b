//! In-memory [`ConnectionSink`], standing in for a real transport in tests.

use chatify_core::connection::ConnectionId;
use chatify_core::delivery::{ConnectionSink, DeliveryError};
use chatify_core::event::ChatEvent;
use chatify_core::scope::ScopeKey;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// One recorded delivery attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivered {
    /// The connection the event was delivered to.
    pub connection_id: ConnectionId,
    /// The scope the event arrived under.
    pub scope: ScopeKey,
    /// The event delivered.
    pub event: ChatEvent,
}

/// Records every delivery attempt, optionally failing delivery to specific
/// connection ids to exercise the "drop and continue" behavior of C5.
#[derive(Default)]
pub struct InMemoryConnectionSink {
    delivered: Mutex<Vec<Delivered>>,
    closed: Mutex<HashSet<ConnectionId>>,
}

impl InMemoryConnectionSink {
    /// Construct a sink that delivers to every connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `connection_id` as closed; future deliveries to it fail with
    /// [`DeliveryError::Closed`].
    pub fn mark_closed(&self, connection_id: ConnectionId) {
        self.closed.lock().expect("closed mutex poisoned").insert(connection_id);
    }

    /// Every delivery recorded so far, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().expect("delivered mutex poisoned").clone()
    }
}

impl ConnectionSink for InMemoryConnectionSink {
    fn deliver(
        &self,
        connection_id: &ConnectionId,
        scope: &ScopeKey,
        event: &ChatEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>> {
        let is_closed = self
            .closed
            .lock()
            .expect("closed mutex poisoned")
            .contains(connection_id);
        if is_closed {
            return Box::pin(async { Err(DeliveryError::Closed) });
        }
        self.delivered.lock().expect("delivered mutex poisoned").push(Delivered {
            connection_id: connection_id.clone(),
            scope: scope.clone(),
            event: event.clone(),
        });
        Box::pin(async { Ok(()) })
    }
}
