//! Redis-backed Presence Registry (C2), per `spec.md` §4.6.
//!
//! Sorted-set members encode `(pod_id, connection_id)` with a length prefix
//! rather than naive `"{pod_id}:{connection_id}"` colon-joining — the
//! Design Notes call out the colon-joined form as brittle if either id
//! contains a colon, and treat it as a bug to fix rather than replicate.

use chatify_core::presence::{PresenceError, PresenceRecord, PresenceRegistry};
use redis::AsyncCommands;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Encode `(pod_id, connection_id)` as a sorted-set member:
/// `"{pod_id_len}:{pod_id}:{connection_id}"`. The length prefix lets
/// [`decode_member`] find the exact boundary even if either id contains a
/// colon.
fn encode_member(pod_id: &str, connection_id: &str) -> String {
    format!("{}:{pod_id}:{connection_id}", pod_id.len())
}

/// Inverse of [`encode_member`].
fn decode_member(member: &str) -> Option<(String, String)> {
    let (len_part, rest) = member.split_once(':')?;
    let pod_len: usize = len_part.parse().ok()?;
    if rest.len() < pod_len + 1 {
        return None;
    }
    let pod_id = &rest[..pod_len];
    let remainder = &rest[pod_len..];
    let connection_id = remainder.strip_prefix(':')?;
    Some((pod_id.to_string(), connection_id.to_string()))
}

fn presence_key(user_id: &str) -> String {
    format!("presence:user:{user_id}")
}

fn route_key(user_id: &str, connection_id: &str) -> String {
    format!("route:{user_id}:{connection_id}")
}

/// Redis-backed [`PresenceRegistry`].
///
/// Uses a connection manager so the pool transparently reconnects across
/// brief Redis blips rather than surfacing every transient disconnect as a
/// [`PresenceError::Unavailable`].
pub struct RedisPresenceRegistry {
    connection: redis::aio::ConnectionManager,
    ttl: Duration,
}

impl RedisPresenceRegistry {
    /// Connect to Redis at `connection_string` (e.g. `redis://localhost:6379`),
    /// registering entries with the given time-to-live (§4.6 default 60s).
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Unavailable`] if the connection could not be
    /// established.
    pub async fn connect(connection_string: &str, ttl: Duration) -> Result<Self, PresenceError> {
        let client = redis::Client::open(connection_string)
            .map_err(|e| PresenceError::Unavailable(e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| PresenceError::Unavailable(e.to_string()))?;
        Ok(Self { connection, ttl })
    }

    async fn touch(&self, user_id: &str, pod_id: &str, connection_id: &str) -> Result<(), PresenceError> {
        let mut conn = self.connection.clone();
        let presence_key = presence_key(user_id);
        let member = encode_member(pod_id, connection_id);
        let score = now_unix_seconds();
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);

        let _: () = redis::pipe()
            .atomic()
            .zadd(&presence_key, &member, score)
            .expire(&presence_key, ttl_secs)
            .set_ex(route_key(user_id, connection_id), pod_id, self.ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| PresenceError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

impl PresenceRegistry for RedisPresenceRegistry {
    fn set_online(
        &self,
        user_id: &str,
        pod_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        let user_id = user_id.to_string();
        let pod_id = pod_id.to_string();
        let connection_id = connection_id.to_string();

        Box::pin(async move {
            self.touch(&user_id, &pod_id, &connection_id).await?;
            tracing::debug!(user_id, pod_id, connection_id, "presence set online");
            Ok(())
        })
    }

    fn heartbeat(
        &self,
        user_id: &str,
        pod_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        // Heartbeat and set_online share identical semantics: both refresh
        // the freshness score and TTL (§4.6).
        self.set_online(user_id, pod_id, connection_id)
    }

    fn set_offline(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        let user_id = user_id.to_string();
        let connection_id = connection_id.to_string();

        Box::pin(async move {
            let mut conn = self.connection.clone();
            let presence_key = presence_key(&user_id);

            let members: Vec<String> = conn
                .zrange(&presence_key, 0, -1)
                .await
                .map_err(|e| PresenceError::Unavailable(e.to_string()))?;
            let target = members
                .into_iter()
                .find(|member| decode_member(member).is_some_and(|(_, c)| c == connection_id));

            let mut pipe = redis::pipe();
            pipe.atomic();
            if let Some(member) = &target {
                pipe.zrem(&presence_key, member).ignore();
            }
            pipe.del(route_key(&user_id, &connection_id)).ignore();
            let _: () = pipe
                .query_async(&mut conn)
                .await
                .map_err(|e| PresenceError::Unavailable(e.to_string()))?;

            let remaining: isize = conn
                .zcard(&presence_key)
                .await
                .map_err(|e| PresenceError::Unavailable(e.to_string()))?;
            if remaining == 0 {
                let _: () = conn
                    .del(&presence_key)
                    .await
                    .map_err(|e| PresenceError::Unavailable(e.to_string()))?;
            }

            tracing::debug!(user_id, connection_id, "presence set offline");
            Ok(())
        })
    }

    fn get_connections(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PresenceRecord>, PresenceError>> + Send + '_>> {
        let user_id = user_id.to_string();

        Box::pin(async move {
            let mut conn = self.connection.clone();
            let presence_key = presence_key(&user_id);

            let members: Vec<String> = conn
                .zrange(&presence_key, 0, -1)
                .await
                .map_err(|e| PresenceError::Unavailable(e.to_string()))?;

            members
                .iter()
                .map(|member| {
                    decode_member(member)
                        .map(|(pod_id, connection_id)| PresenceRecord {
                            pod_id,
                            connection_id,
                        })
                        .ok_or_else(|| {
                            PresenceError::DecodeFailed(format!("malformed member: {member}"))
                        })
                })
                .collect()
        })
    }
}

fn now_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
