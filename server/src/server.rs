//! [`ChatifyServer`]: the transport-facing operations (§6) an external
//! transport layer drives — `Join`, `Leave`, `Send`, `OnConnect`,
//! `OnDisconnect` — plus graceful shutdown of this pod's background loops.

use chatify_core::connection::{Connection, ConnectionId};
use chatify_core::error::{ChatifyError, ChatifyResult};
use chatify_core::event::EnrichedChatEvent;
use chatify_core::presence::PresenceRegistry;
use chatify_core::registry::ScopeRegistry;
use chatify_core::scope::ScopeKey;
use chatify_runtime::SendPipeline;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running pod.
///
/// Holds the scope registry, send pipeline, and presence registry an
/// external transport layer drives through the five operations below, plus
/// the cancellation token and background task handles
/// [`crate::startup::run`] spawned for this pod's Broadcast Consumer (C5)
/// and History Writer (C6) loops.
pub struct ChatifyServer {
    pub(crate) registry: Arc<ScopeRegistry>,
    pub(crate) send_pipeline: Arc<SendPipeline>,
    pub(crate) presence: Arc<dyn PresenceRegistry>,
    pub(crate) pod_id: String,
    pub(crate) cancellation: CancellationToken,
    pub(crate) background_tasks: Vec<JoinHandle<()>>,
}

impl ChatifyServer {
    /// Register `connection` as online under this pod (C2), per §6's
    /// `OnConnect` operation.
    ///
    /// # Errors
    ///
    /// Returns [`ChatifyError::ConfigurationError`] if the presence store
    /// could not be reached.
    pub async fn on_connect(&self, connection: &Connection) -> ChatifyResult<()> {
        self.presence
            .set_online(
                connection.user_id.as_str(),
                &self.pod_id,
                connection.connection_id.as_str(),
            )
            .await
            .map_err(|e| {
                ChatifyError::configuration_with_source("presence store unreachable on connect", e)
            })
    }

    /// Tear down `connection_id`: leave every scope it had joined (C1) and
    /// remove its presence record (C2), per §6's `OnDisconnect` operation. A
    /// no-op if the connection was never registered.
    ///
    /// # Errors
    ///
    /// Returns [`ChatifyError::ConfigurationError`] if the presence store
    /// could not be reached.
    pub async fn on_disconnect(&self, connection_id: &ConnectionId) -> ChatifyResult<()> {
        let Some(connection) = self.registry.connection(connection_id) else {
            return Ok(());
        };
        self.registry.leave_all(connection_id);
        self.presence
            .set_offline(connection.user_id.as_str(), connection_id.as_str())
            .await
            .map_err(|e| {
                ChatifyError::configuration_with_source(
                    "presence store unreachable on disconnect",
                    e,
                )
            })
    }

    /// Join `connection` to `scope` on this pod (C1), per §6's `Join`
    /// operation.
    pub fn join(&self, connection: Connection, scope: ScopeKey) {
        self.registry.join(connection, scope);
    }

    /// Remove `connection_id` from `scope` on this pod (C1), per §6's
    /// `Leave` operation.
    pub fn leave(&self, connection_id: &ConnectionId, scope: &ScopeKey) {
        self.registry.leave(connection_id, scope);
    }

    /// Validate, rate-limit, stamp, and publish `text` from `sender_id` into
    /// `scope` (C7), per §6's `Send` operation.
    ///
    /// # Errors
    ///
    /// See [`SendPipeline::send`].
    pub async fn send(
        &self,
        sender_id: &str,
        scope: ScopeKey,
        text: &str,
    ) -> ChatifyResult<EnrichedChatEvent> {
        self.send_pipeline.send(sender_id, scope, text).await
    }

    /// Number of scopes with at least one locally-joined connection, for
    /// diagnostics.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.registry.scope_count()
    }

    /// This pod's resolved identity, as stamped on `origin_pod_id`.
    #[must_use]
    pub fn pod_id(&self) -> &str {
        &self.pod_id
    }

    /// Signal every background loop (C5, C6) spawned for this pod to commit
    /// its in-flight offset and stop, then wait for them to exit.
    pub async fn shutdown(mut self) {
        self.cancellation.cancel();
        for task in self.background_tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "background task panicked during shutdown");
            }
        }
    }
}
