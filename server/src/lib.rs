//! # Chatify Server
//!
//! Single configurable startup for one Chatify pod: reads [`Config`],
//! constructs real or in-memory backends depending on
//! `MessageBrokerConfig::use_in_memory`, starts the metrics server, spawns
//! the Broadcast Consumer (C5) and History Writer (C6) loops, and returns a
//! [`ChatifyServer`] exposing the transport-facing operations (`Join`,
//! `Leave`, `Send`, `OnConnect`, `OnDisconnect`) for an (out-of-scope)
//! transport layer to call.
//!
//! ## Example
//!
//! ```no_run
//! use chatify_server::config::Config;
//! use chatify_testing::InMemoryConnectionSink;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = Arc::new(InMemoryConnectionSink::new());
//! let server = chatify_server::startup::run(Config::default(), sink).await?;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod server;
pub mod startup;

pub use config::Config;
pub use error::StartupError;
pub use server::ChatifyServer;
