//! The single configurable startup.
//!
//! [`run`] reads a [`Config`], constructs real or in-memory backends
//! depending on `MessageBrokerConfig::use_in_memory`, starts the metrics
//! server, spawns the Broadcast Consumer (C5) and History Writer (C6)
//! loops, and returns a [`ChatifyServer`] exposing the transport-facing
//! operations (§6). There is exactly one startup path here, branching only
//! on `use_in_memory` — never a separate "classic vs minimal vs test" entry
//! point (Design Notes §9).

use chatify_columnar::ScyllaColumnarStore;
use chatify_core::columnar::ColumnarStore;
use chatify_core::delivery::ConnectionSink;
use chatify_core::event_bus::{EventConsumer, EventProducer};
use chatify_core::identity::{self, PodIdentity};
use chatify_core::presence::PresenceRegistry;
use chatify_core::ratelimit::RateLimiter;
use chatify_core::registry::ScopeRegistry;
use chatify_keyvalue::{RedisPresenceRegistry, RedisRateLimiter};
use chatify_redpanda::{RedpandaEventConsumer, RedpandaEventProducer};
use chatify_runtime::metrics::MetricsServer;
use chatify_runtime::{BroadcastConsumerLoop, HistoryWriterLoop, LoggingDeadLetterSink, RetryPolicy, SendPipeline};
use chatify_testing::{InMemoryColumnarStore, InMemoryEventBus, InMemoryPresenceRegistry, InMemoryRateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::StartupError;
use crate::server::ChatifyServer;

/// Timeout the Redpanda producer waits for `acks=all` confirmation.
const PRODUCER_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a `tracing` subscriber honoring `RUST_LOG`, defaulting to `info`.
/// Safe to call more than once — a second install is logged and ignored
/// rather than panicking, since tests construct several servers in one
/// process.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed, skipping");
    }
}

/// Wire up one pod's backends and start its background loops.
///
/// `sink` is the out-of-scope transport layer's [`ConnectionSink`]: the
/// Broadcast Consumer (C5) calls it to push delivered events down whatever
/// connections this pod is holding.
///
/// # Errors
///
/// Returns [`StartupError`] if any real backend (Redpanda, Redis, Scylla)
/// could not be reached, the metrics address failed to parse, or the
/// metrics server could not bind.
pub async fn run(config: Config, sink: Arc<dyn ConnectionSink>) -> Result<ChatifyServer, StartupError> {
    init_tracing();

    let identity = identity::resolve();
    let pod_id = identity.pod_id().to_string();
    tracing::info!(pod_id, "starting chatify pod");

    let metrics_addr = config
        .metrics_addr
        .parse()
        .map_err(StartupError::InvalidMetricsAddr)?;
    let mut metrics_server = MetricsServer::new(metrics_addr);
    metrics_server.start()?;

    let registry = Arc::new(ScopeRegistry::new());
    let cancellation = CancellationToken::new();

    let (producer, broadcast_consumer, history_consumer): (
        Arc<dyn EventProducer>,
        Arc<dyn EventConsumer>,
        Arc<dyn EventConsumer>,
    ) = if config.message_broker.use_in_memory {
        let partitions = i32::try_from(config.message_broker.partitions).unwrap_or(i32::MAX);
        let bus = InMemoryEventBus::new(partitions);
        (
            Arc::new(bus.producer()),
            Arc::new(bus.consumer()),
            Arc::new(bus.consumer()),
        )
    } else {
        let producer = RedpandaEventProducer::connect(
            &config.message_broker.bootstrap_servers,
            config.message_broker.topic.clone(),
            PRODUCER_ACK_TIMEOUT,
        )?;
        let broadcast_consumer = RedpandaEventConsumer::new(
            config.message_broker.bootstrap_servers.clone(),
            config.message_broker.topic.clone(),
        );
        let history_consumer = RedpandaEventConsumer::new(
            config.message_broker.bootstrap_servers.clone(),
            config.message_broker.topic.clone(),
        );
        (
            Arc::new(producer),
            Arc::new(broadcast_consumer),
            Arc::new(history_consumer),
        )
    };

    let presence: Arc<dyn PresenceRegistry> = if config.message_broker.use_in_memory {
        Arc::new(InMemoryPresenceRegistry::new(
            Arc::new(chatify_core::clock::SystemClock),
            config.presence.ttl(),
        ))
    } else {
        Arc::new(
            RedisPresenceRegistry::connect(&config.key_value_store.connection_string, config.presence.ttl())
                .await?,
        )
    };

    let rate_limiter: Arc<dyn RateLimiter> = if config.message_broker.use_in_memory {
        Arc::new(InMemoryRateLimiter::new(
            Arc::new(chatify_core::clock::SystemClock),
            config.rate_limit.threshold,
            config.rate_limit.window(),
        ))
    } else {
        Arc::new(
            RedisRateLimiter::connect(
                &config.key_value_store.connection_string,
                config.rate_limit.threshold,
                config.rate_limit.window_seconds,
            )
            .await?,
        )
    };

    let columnar_store: Arc<dyn ColumnarStore> = if config.message_broker.use_in_memory {
        Arc::new(InMemoryColumnarStore::new())
    } else {
        Arc::new(
            ScyllaColumnarStore::connect(&config.columnar_store.contact_points, &config.columnar_store.keyspace)
                .await?,
        )
    };

    let identity: Arc<dyn PodIdentity> = Arc::new(identity);
    let send_pipeline = Arc::new(SendPipeline::new(
        Arc::clone(&rate_limiter),
        Arc::clone(&producer),
        Arc::new(chatify_core::clock::SystemClock),
        Arc::clone(&identity),
    ));

    let broadcast_loop = BroadcastConsumerLoop::new(broadcast_consumer, Arc::clone(&registry), sink);
    let broadcast_group_id = config.message_broker.broadcast_group_id(&pod_id);
    let broadcast_cancellation = cancellation.clone();
    let broadcast_handle = tokio::spawn(async move {
        if let Err(e) = broadcast_loop.run(&broadcast_group_id, broadcast_cancellation).await {
            tracing::error!(error = %e, "broadcast consumer loop exited with error");
        }
    });

    let retry_policy = RetryPolicy::builder()
        .max_retries(usize::try_from(config.database_retry.max_attempts).unwrap_or(usize::MAX).saturating_sub(1))
        .initial_delay(Duration::from_millis(config.database_retry.base_delay_ms))
        .max_delay(Duration::from_millis(config.database_retry.max_delay_ms))
        .jitter(jitter_fraction(&config.database_retry))
        .build();

    let history_writer_loop = HistoryWriterLoop::new(
        history_consumer,
        columnar_store,
        Arc::new(LoggingDeadLetterSink::new(config.history_writer.max_payload_log_bytes)),
        retry_policy,
    );
    let history_group_id = config.history_writer.consumer_group_id.clone();
    let history_cancellation = cancellation.clone();
    let history_handle = tokio::spawn(async move {
        if let Err(e) = history_writer_loop.run(&history_group_id, history_cancellation).await {
            tracing::error!(error = %e, "history writer loop exited with error");
        }
    });

    Ok(ChatifyServer {
        registry,
        send_pipeline,
        presence,
        pod_id,
        cancellation,
        background_tasks: vec![broadcast_handle, history_handle],
    })
}

/// `DatabaseRetryConfig` expresses jitter as an additive millisecond bound;
/// `RetryPolicy` expects a multiplicative fraction of the computed delay.
/// Approximate the fraction as `jitter_ms / base_delay_ms`, clamped to
/// `[0, 1]`.
fn jitter_fraction(retry: &chatify_core::config::DatabaseRetryConfig) -> f64 {
    if retry.base_delay_ms == 0 {
        return 0.0;
    }
    (retry.jitter_ms as f64 / retry.base_delay_ms as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatify_core::connection::{Connection, ConnectionId, UserId};
    use chatify_core::scope::{ScopeId, ScopeKey, ScopeType};
    use chatify_testing::InMemoryConnectionSink;

    fn in_memory_config() -> Config {
        let mut config = Config::default();
        config.message_broker.use_in_memory = true;
        config
    }

    #[tokio::test]
    async fn run_wires_an_in_memory_pod_and_accepts_a_send() {
        let sink = Arc::new(InMemoryConnectionSink::new());
        let server = run(in_memory_config(), sink).await.expect("startup succeeds");

        let scope = ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("general"));
        let enriched = server
            .send("user-a", scope, "hello")
            .await
            .expect("send succeeds");
        assert_eq!(enriched.event.sender_id, "user-a");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn run_tracks_join_leave_and_presence() {
        let sink = Arc::new(InMemoryConnectionSink::new());
        let server = run(in_memory_config(), sink).await.expect("startup succeeds");

        let connection = Connection::new(ConnectionId::new("conn-1"), UserId::new("user-a"));
        let scope = ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("general"));

        server.on_connect(&connection).await.expect("connect succeeds");
        server.join(connection.clone(), scope.clone());
        assert_eq!(server.scope_count(), 1);

        server.on_disconnect(&connection.connection_id).await.expect("disconnect succeeds");
        assert_eq!(server.scope_count(), 0);

        server.shutdown().await;
    }
}
