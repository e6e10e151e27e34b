//! Scope identification: the partition key used everywhere in Chatify.
//!
//! A [`ScopeKey`] pairs a [`ScopeType`] with a [`ScopeId`] and is the thing
//! every message, subscription, and stored row is keyed by. Its canonical
//! serialized form (`"{ScopeType}:{ScopeId}"`) is the single place that
//! concatenation happens — every other module treats `ScopeKey` as an opaque
//! value and calls [`ScopeKey::canonical`] rather than building the string
//! itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a [`ScopeId`] fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid scope id: {0}")]
pub struct ParseScopeIdError(String);

/// Whether a scope is a multi-participant channel or a direct message.
///
/// Serializes to exactly `"Channel"` or `"DirectMessage"`, matching the
/// `scopeType` field of the wire format in the log and the `ScopeType`
/// component of the canonical `ScopeKey` string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeType {
    /// A many-participant channel.
    Channel,
    /// A (typically two-party) direct message conversation.
    DirectMessage,
}

impl ScopeType {
    /// The string used in the canonical `ScopeKey` serialization and in the
    /// `scopeType` wire field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "Channel",
            Self::DirectMessage => "DirectMessage",
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = ParseScopeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Channel" => Ok(Self::Channel),
            "DirectMessage" => Ok(Self::DirectMessage),
            other => Err(ParseScopeIdError(format!("unknown scope type: {other}"))),
        }
    }
}

/// Identifier of a scope within its [`ScopeType`].
///
/// A newtype wrapper around `String`, following the same validated/unchecked
/// split as an event-sourced stream identifier: [`FromStr`] validates
/// (1–256 non-whitespace characters per `spec.md` §3), while
/// [`ScopeId::new_unchecked`] is for application-controlled data that is
/// already known to be valid (e.g. round-tripping a value read back out of
/// the log).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(String);

impl ScopeId {
    /// Maximum length in bytes, per `spec.md` §3.
    pub const MAX_LEN: usize = 256;

    /// Construct a `ScopeId` without validating it.
    ///
    /// Use only for application-controlled data already known to satisfy the
    /// 1–256 non-whitespace-character invariant (e.g. values read back out of
    /// storage that were validated on the way in).
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScopeId {
    type Err = ParseScopeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > Self::MAX_LEN {
            return Err(ParseScopeIdError(format!(
                "scope id must be 1..={} characters, got {}",
                Self::MAX_LEN,
                s.len()
            )));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(ParseScopeIdError(
                "scope id must not contain whitespace".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for ScopeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `(ScopeType, ScopeId)` — the partition key for a message, used as the log
/// record key and the `chat_messages` partition key alike.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    /// Whether this scope is a channel or a direct message.
    pub scope_type: ScopeType,
    /// The scope's identifier within its type.
    pub scope_id: ScopeId,
}

/// Error returned when parsing a canonical `"{ScopeType}:{ScopeId}"` string fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid scope key: {0}")]
pub struct ParseScopeKeyError(String);

impl ScopeKey {
    /// Construct a new `ScopeKey`.
    #[must_use]
    pub const fn new(scope_type: ScopeType, scope_id: ScopeId) -> Self {
        Self {
            scope_type,
            scope_id,
        }
    }

    /// The canonical `"{ScopeType}:{ScopeId}"` serialization.
    ///
    /// This is the log record key, the `scope_id` column written to
    /// `chat_messages`, and the only place this concatenation happens in the
    /// workspace — every other module calls this method instead of building
    /// the string itself.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.scope_type, self.scope_id)
    }

    /// Parse a canonical `"{ScopeType}:{ScopeId}"` string back into a `ScopeKey`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseScopeKeyError`] if the string has no `:` separator, the
    /// type component is not `Channel`/`DirectMessage`, or the id component
    /// fails [`ScopeId`] validation.
    pub fn parse_canonical(s: &str) -> Result<Self, ParseScopeKeyError> {
        let (type_part, id_part) = s
            .split_once(':')
            .ok_or_else(|| ParseScopeKeyError(format!("missing ':' separator in {s:?}")))?;
        let scope_type = type_part
            .parse::<ScopeType>()
            .map_err(|e| ParseScopeKeyError(e.to_string()))?;
        let scope_id = id_part
            .parse::<ScopeId>()
            .map_err(|e| ParseScopeKeyError(e.to_string()))?;
        Ok(Self::new(scope_type, scope_id))
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_id_rejects_empty_and_too_long() {
        assert!("".parse::<ScopeId>().is_err());
        let too_long = "a".repeat(257);
        assert!(too_long.parse::<ScopeId>().is_err());
        let max = "a".repeat(256);
        assert!(max.parse::<ScopeId>().is_ok());
    }

    #[test]
    fn scope_id_rejects_whitespace() {
        assert!("has space".parse::<ScopeId>().is_err());
        assert!("tab\tchar".parse::<ScopeId>().is_err());
    }

    #[test]
    fn scope_key_canonical_roundtrip() {
        let key = ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("scope-1"));
        assert_eq!(key.canonical(), "Channel:scope-1");
        let parsed = ScopeKey::parse_canonical("Channel:scope-1").expect("valid");
        assert_eq!(parsed, key);
    }

    #[test]
    fn scope_key_direct_message_roundtrip() {
        let key = ScopeKey::new(ScopeType::DirectMessage, ScopeId::new_unchecked("dm-42"));
        let canonical = key.canonical();
        let parsed = ScopeKey::parse_canonical(&canonical).expect("valid");
        assert_eq!(parsed, key);
    }

    #[test]
    fn scope_key_parse_rejects_missing_separator() {
        assert!(ScopeKey::parse_canonical("no-colon-here").is_err());
    }

    #[test]
    fn scope_key_parse_rejects_unknown_type() {
        assert!(ScopeKey::parse_canonical("Bogus:scope-1").is_err());
    }

    #[test]
    fn scope_type_display() {
        assert_eq!(ScopeType::Channel.to_string(), "Channel");
        assert_eq!(ScopeType::DirectMessage.to_string(), "DirectMessage");
    }
}
