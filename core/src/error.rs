//! The `Error`/`Result` sum type used at every Chatify operation boundary.
//!
//! Per `spec.md` §3 and the Design Notes (§9), this is expressed as a native
//! Rust `Result<T, ChatifyError>` rather than a hand-rolled
//! `Success`/`Failure` enum — `?` and `match` already give the short-circuit
//! and pattern-match ergonomics the source's sum type was reaching for.
//! Exceptions (panics) are reserved for programmer errors only; every
//! fallible boundary in this workspace returns a `Result`.

use thiserror::Error;

/// The stable error kinds surfaced at Chatify's operation boundaries.
///
/// Each variant carries a human-readable message and, where applicable, the
/// causing error. [`ChatifyError::code`] returns the stable string code used
/// for metrics labels and client-facing error payloads.
#[derive(Error, Debug)]
pub enum ChatifyError {
    /// A request failed input validation (§4.1 step 1).
    #[error("validation failed: {message}")]
    Validation {
        /// Human-readable description of what failed validation.
        message: String,
    },

    /// The sender has exceeded their rate limit (§4.7).
    #[error("rate limit exceeded for {sender_id}")]
    RateLimitExceeded {
        /// The sender that was throttled.
        sender_id: String,
    },

    /// A configuration problem: an empty pod id, an unreachable rate-limit
    /// store, or similar fail-fast-and-alert conditions (§4.1 step 3, §4.7).
    #[error("configuration error: {message}")]
    ConfigurationError {
        /// Human-readable description of the misconfiguration.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The event producer (C4) failed to publish after exhausting retries.
    #[error("event production failed: {message}")]
    EventProductionFailed {
        /// Human-readable description of the publish failure.
        message: String,
        /// The underlying broker error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ChatifyError {
    /// The stable string code for this error kind, for metrics labels and
    /// client-facing payloads. Stable across message-text changes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::ConfigurationError { .. } => "configuration_error",
            Self::EventProductionFailed { .. } => "event_production_failed",
        }
    }

    /// Construct a [`ChatifyError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Construct a [`ChatifyError::RateLimitExceeded`].
    #[must_use]
    pub fn rate_limit_exceeded(sender_id: impl Into<String>) -> Self {
        Self::RateLimitExceeded {
            sender_id: sender_id.into(),
        }
    }

    /// Construct a [`ChatifyError::ConfigurationError`] with no source error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            source: None,
        }
    }

    /// Construct a [`ChatifyError::ConfigurationError`] wrapping a source error.
    pub fn configuration_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Construct a [`ChatifyError::EventProductionFailed`] wrapping a source error.
    pub fn event_production_failed(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::EventProductionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Convenience alias for `Result<T, ChatifyError>`, used at every operation
/// boundary in the workspace.
pub type ChatifyResult<T> = Result<T, ChatifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ChatifyError::validation("x").code(), "validation");
        assert_eq!(
            ChatifyError::rate_limit_exceeded("u1").code(),
            "rate_limit_exceeded"
        );
        assert_eq!(
            ChatifyError::configuration("x").code(),
            "configuration_error"
        );
    }

    #[test]
    fn display_includes_message() {
        let err = ChatifyError::validation("text too long");
        assert!(err.to_string().contains("text too long"));
    }
}
