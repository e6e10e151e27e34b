//! # Chatify Key-Value
//!
//! Redis-backed implementations of the Presence Registry (C2) and Rate
//! Limiter (C3), the two components the Design Notes describe as
//! "delegate all shared state to the external store; no in-process cache."
//!
//! The teacher workspace had no key-value-store dependency to generalize —
//! Redis sorted sets (for presence) and `EVAL`-scripted atomic counters
//! (for rate limiting) are the idiomatic fit for both, so this crate is
//! built against `redis` directly, grounded in how other services in the
//! broader example pack use it for the same two purposes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod presence;
pub mod ratelimit;

pub use presence::RedisPresenceRegistry;
pub use ratelimit::RedisRateLimiter;
