//! # Chatify Testing
//!
//! In-memory test doubles for every trait boundary `chatify-core` defines,
//! used to drive the scenario tests (S1-S6) and testable-property tests
//! (§8) against a single process instead of a live Redpanda/Redis/Scylla
//! fleet.
//!
//! - [`clock`] — deterministic and manually-advanceable clocks.
//! - [`event_bus`] — [`event_bus::InMemoryEventBus`], the shared in-memory
//!   log standing in for `chatify-redpanda`.
//! - [`presence`] — [`presence::InMemoryPresenceRegistry`], standing in for
//!   `chatify-keyvalue`'s presence half.
//! - [`ratelimit`] — [`ratelimit::InMemoryRateLimiter`], standing in for
//!   `chatify-keyvalue`'s rate-limit half.
//! - [`columnar`] — [`columnar::InMemoryColumnarStore`], standing in for
//!   `chatify-columnar`.
//! - [`delivery`] — [`delivery::InMemoryConnectionSink`], standing in for a
//!   real transport.
//!
//! ## Example
//!
//! ```
//! use chatify_testing::event_bus::InMemoryEventBus;
//!
//! let bus = InMemoryEventBus::new(4);
//! let producer = bus.producer();
//! let consumer = bus.consumer();
//! # let _ = (producer, consumer);
//! ```

pub mod clock;
pub mod columnar;
pub mod delivery;
pub mod event_bus;
pub mod presence;
pub mod ratelimit;

pub use clock::{test_clock, FixedClock, ManualClock};
pub use columnar::InMemoryColumnarStore;
pub use delivery::{Delivered, InMemoryConnectionSink};
pub use event_bus::{InMemoryEventBus, InMemoryEventConsumer, InMemoryEventProducer};
pub use presence::InMemoryPresenceRegistry;
pub use ratelimit::InMemoryRateLimiter;
