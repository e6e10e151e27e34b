//! Aggregate configuration for [`crate::startup::run`].
//!
//! Every nested config struct already owns its own `from_env()`/`Default`
//! (`chatify_core::config`); this just collects them plus the one setting
//! that belongs to the pod's own process rather than any single component —
//! where its metrics server binds.

use chatify_core::config::{
    ChatHistoryWriterConfig, ColumnarStoreConfig, DatabaseRetryConfig, KeyValueStoreConfig,
    MessageBrokerConfig, PresenceConfig, RateLimitConfig,
};

fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Every configuration setting one pod's startup needs, collected from the
/// per-component structs in `chatify_core::config` plus this crate's own.
#[derive(Clone, Debug)]
pub struct Config {
    /// C4/C5 log transport settings.
    pub message_broker: MessageBrokerConfig,
    /// C6 consumer group and payload-logging settings.
    pub history_writer: ChatHistoryWriterConfig,
    /// Retry policy for columnar-store writes (C6).
    pub database_retry: DatabaseRetryConfig,
    /// C3 fixed-window quota settings.
    pub rate_limit: RateLimitConfig,
    /// C2 freshness TTL.
    pub presence: PresenceConfig,
    /// C6/C8 cluster connection settings.
    pub columnar_store: ColumnarStoreConfig,
    /// C2/C3 shared key-value store connection settings.
    pub key_value_store: KeyValueStoreConfig,
    /// `host:port` the Prometheus metrics server binds to.
    pub metrics_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            message_broker: MessageBrokerConfig::default(),
            history_writer: ChatHistoryWriterConfig::default(),
            database_retry: DatabaseRetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            presence: PresenceConfig::default(),
            columnar_store: ColumnarStoreConfig::default(),
            key_value_store: KeyValueStoreConfig::default(),
            metrics_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Config {
    /// Build from environment variables, falling back to documented
    /// defaults for any unset. Each nested struct reads its own documented
    /// variables; `CHATIFY_METRICS_ADDR` is this crate's own addition.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            message_broker: MessageBrokerConfig::from_env(),
            history_writer: ChatHistoryWriterConfig::from_env(),
            database_retry: DatabaseRetryConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            presence: PresenceConfig::from_env(),
            columnar_store: ColumnarStoreConfig::from_env(),
            key_value_store: KeyValueStoreConfig::from_env(),
            metrics_addr: env_string_or("CHATIFY_METRICS_ADDR", &default.metrics_addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_addr_matches_documented_value() {
        assert_eq!(Config::default().metrics_addr, "0.0.0.0:9090");
    }
}
