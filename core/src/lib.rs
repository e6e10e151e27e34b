//! # Chatify Core
//!
//! Data model and trait contracts for the Chatify real-time chat backbone.
//!
//! This crate owns the types every other crate in the workspace depends on:
//! the [`scope`] partition key, the [`event`] wire format, the
//! per-operation [`error`] type, and the trait boundaries ([`event_bus`],
//! [`presence`], [`ratelimit`], [`columnar`]) that the `redpanda`,
//! `keyvalue`, `columnar`, and `testing` crates implement concretely.
//!
//! ## Architecture
//!
//! Control flow for one message: the transport layer (out of scope) calls
//! into the send pipeline (`chatify-runtime`), which validates, consults
//! [`ratelimit::RateLimiter`], stamps a [`event::ChatEvent`] using
//! [`clock::Clock`] and [`identity::PodIdentity`], and publishes through
//! [`event_bus::EventProducer`]. The log is the source of truth from there:
//! every pod's broadcast consumer reads it and fans out through
//! [`registry::ScopeRegistry`]; a single shared consumer group writes it
//! through [`columnar::ColumnarStore`].

pub mod clock;
pub mod columnar;
pub mod config;
pub mod connection;
pub mod delivery;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod identity;
pub mod presence;
pub mod ratelimit;
pub mod registry;
pub mod scope;

pub use clock::{Clock, SystemClock};
pub use columnar::{ColumnarStore, ColumnarStoreError, HistoryReader};
pub use connection::{Connection, ConnectionId, UserId};
pub use delivery::{ConnectionSink, DeliveryError};
pub use error::{ChatifyError, ChatifyResult};
pub use event::{ChatEvent, EnrichedChatEvent};
pub use event_bus::{EventBusError, EventConsumer, EventProducer, EventStream};
pub use identity::{PodIdentity, StaticPodIdentity};
pub use presence::{PresenceError, PresenceRecord, PresenceRegistry, recommended_heartbeat_interval};
pub use ratelimit::{RateLimitDecision, RateLimitError, RateLimiter};
pub use registry::ScopeRegistry;
pub use scope::{ScopeId, ScopeKey, ScopeType};
