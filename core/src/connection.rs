//! Connection identity: what the Scope Registry (C1) tracks per socket.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque per-socket identifier, unique within a pod for the socket's
/// lifetime. Assigned by the transport layer on connect; Chatify never
/// constructs one itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wrap a transport-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the authenticated user behind a connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap an authenticated user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live connection tracked by the Scope Registry: who it is and which
/// scopes it has joined on this pod.
///
/// `joined_scopes` is maintained by the registry itself (via `join`/`leave`)
/// rather than by the caller mutating this struct directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    /// The socket's identifier.
    pub connection_id: ConnectionId,
    /// The user behind the socket.
    pub user_id: UserId,
}

impl Connection {
    /// Pair a connection id with its user.
    #[must_use]
    pub const fn new(connection_id: ConnectionId, user_id: UserId) -> Self {
        Self {
            connection_id,
            user_id,
        }
    }
}
