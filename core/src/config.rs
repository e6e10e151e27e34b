//! Configuration structs recognized at every layer (§6).
//!
//! Every struct here is a plain value with a [`Default`] impl for tests and
//! a `from_env` constructor reading the documented environment variables —
//! explicit constructor parameters throughout, never a DI container (Design
//! Notes §9).

use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Configuration for the log transport (C4/C5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageBrokerConfig {
    /// Comma-separated `host:port` broker addresses.
    pub bootstrap_servers: String,
    /// The topic all chat events are published to.
    pub topic: String,
    /// Number of partitions the topic is expected to have.
    pub partitions: u32,
    /// Prefix for the per-pod broadcast consumer group (§4.3).
    pub broadcast_consumer_group_prefix: String,
    /// When `true`, C4/C5 are backed by an in-process stub that preserves
    /// partitioning and offset semantics, for tests.
    pub use_in_memory: bool,
}

impl Default for MessageBrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "chat-events".to_string(),
            partitions: 6,
            broadcast_consumer_group_prefix: "chatify-broadcast".to_string(),
            use_in_memory: false,
        }
    }
}

impl MessageBrokerConfig {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            bootstrap_servers: env_string_or(
                "CHATIFY_BROKER_BOOTSTRAP_SERVERS",
                &default.bootstrap_servers,
            ),
            topic: env_string_or("CHATIFY_BROKER_TOPIC", &default.topic),
            partitions: env_or("CHATIFY_BROKER_PARTITIONS", default.partitions),
            broadcast_consumer_group_prefix: env_string_or(
                "CHATIFY_BROADCAST_GROUP_PREFIX",
                &default.broadcast_consumer_group_prefix,
            ),
            use_in_memory: env_or("CHATIFY_USE_IN_MEMORY", default.use_in_memory),
        }
    }

    /// This pod's broadcast consumer group id, per §4.3:
    /// `chatify-broadcast-{pod_id}`.
    #[must_use]
    pub fn broadcast_group_id(&self, pod_id: &str) -> String {
        format!("{}-{pod_id}", self.broadcast_consumer_group_prefix)
    }
}

/// Configuration for the History Writer (C6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatHistoryWriterConfig {
    /// The single shared consumer group all writer instances join (§4.4).
    pub consumer_group_id: String,
    /// Maximum bytes of a poison-message payload to log as a preview.
    pub max_payload_log_bytes: usize,
}

impl Default for ChatHistoryWriterConfig {
    fn default() -> Self {
        Self {
            consumer_group_id: "chatify-chat-history-writer".to_string(),
            max_payload_log_bytes: 256,
        }
    }
}

impl ChatHistoryWriterConfig {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            consumer_group_id: env_string_or(
                "CHATIFY_HISTORY_WRITER_GROUP_ID",
                &default.consumer_group_id,
            ),
            max_payload_log_bytes: env_or(
                "CHATIFY_MAX_PAYLOAD_LOG_BYTES",
                default.max_payload_log_bytes,
            ),
        }
    }
}

/// Retry policy parameters for columnar-store writes (§4.4 step 4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseRetryConfig {
    /// Maximum attempts before giving up.
    pub max_attempts: u32,
    /// Initial backoff delay.
    pub base_delay_ms: u64,
    /// Maximum backoff delay, regardless of attempt count.
    pub max_delay_ms: u64,
    /// Jitter added to each computed delay, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for DatabaseRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            jitter_ms: 50,
        }
    }
}

impl DatabaseRetryConfig {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_attempts: env_or("CHATIFY_DB_RETRY_MAX_ATTEMPTS", default.max_attempts),
            base_delay_ms: env_or("CHATIFY_DB_RETRY_BASE_DELAY_MS", default.base_delay_ms),
            max_delay_ms: env_or("CHATIFY_DB_RETRY_MAX_DELAY_MS", default.max_delay_ms),
            jitter_ms: env_or("CHATIFY_DB_RETRY_JITTER_MS", default.jitter_ms),
        }
    }
}

/// Configuration for the Rate Limiter (C3), per §4.7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum sends allowed per window.
    pub threshold: u32,
    /// Window size in seconds.
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            threshold: 100,
            window_seconds: 60,
        }
    }
}

impl RateLimitConfig {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            threshold: env_or("CHATIFY_RATE_LIMIT_THRESHOLD", default.threshold),
            window_seconds: env_or(
                "CHATIFY_RATE_LIMIT_WINDOW_SECONDS",
                default.window_seconds,
            ),
        }
    }

    /// The window as a [`Duration`].
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// The store key for `sender_id` under this configuration's window, per
    /// §3: `rl:{user_id}:SendMessage:{window_seconds}`.
    #[must_use]
    pub fn key(&self, sender_id: &str) -> String {
        format!("rl:{sender_id}:SendMessage:{}", self.window_seconds)
    }
}

/// Configuration for the Presence Registry (C2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Freshness TTL in seconds, per §4.6.
    pub ttl_seconds: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { ttl_seconds: 60 }
    }
}

impl PresenceConfig {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            ttl_seconds: env_or("CHATIFY_PRESENCE_TTL_SECONDS", default.ttl_seconds),
        }
    }

    /// The TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Configuration for the columnar store (C6/C8).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnarStoreConfig {
    /// Comma-separated contact point addresses.
    pub contact_points: String,
    /// Keyspace holding the `chat_messages` table.
    pub keyspace: String,
}

impl Default for ColumnarStoreConfig {
    fn default() -> Self {
        Self {
            contact_points: "localhost:9042".to_string(),
            keyspace: "chatify".to_string(),
        }
    }
}

impl ColumnarStoreConfig {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            contact_points: env_string_or(
                "CHATIFY_COLUMNAR_CONTACT_POINTS",
                &default.contact_points,
            ),
            keyspace: env_string_or("CHATIFY_COLUMNAR_KEYSPACE", &default.keyspace),
        }
    }
}

/// Configuration for the shared key-value store (C2/C3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValueStoreConfig {
    /// Connection string (e.g. `redis://localhost:6379`).
    pub connection_string: String,
}

impl Default for KeyValueStoreConfig {
    fn default() -> Self {
        Self {
            connection_string: "redis://localhost:6379".to_string(),
        }
    }
}

impl KeyValueStoreConfig {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            connection_string: env_string_or(
                "CHATIFY_KV_CONNECTION_STRING",
                &default.connection_string,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_key_matches_documented_format() {
        let config = RateLimitConfig::default();
        assert_eq!(config.key("user-d"), "rl:user-d:SendMessage:60");
    }

    #[test]
    fn broadcast_group_id_matches_documented_format() {
        let config = MessageBrokerConfig::default();
        assert_eq!(config.broadcast_group_id("pod-1"), "chatify-broadcast-pod-1");
    }

    #[test]
    fn defaults_match_spec() {
        assert_eq!(RateLimitConfig::default().threshold, 100);
        assert_eq!(RateLimitConfig::default().window_seconds, 60);
        assert_eq!(PresenceConfig::default().ttl_seconds, 60);
    }
}
