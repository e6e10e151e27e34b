//! `ChatEvent`: the immutable fact published for every sent message.
//!
//! Unlike the event-sourcing `Event` trait this module used to hold — which
//! serialized to `bincode` for internal storage efficiency — `ChatEvent` is
//! the thing that crosses the wire (the log record value), so it serializes
//! to the camelCase JSON shape Chatify's wire format specifies.

use crate::scope::ScopeKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable fact: a message was sent to a scope.
///
/// `message_id` is globally unique; `created_at_utc` is monotone per
/// `(origin_pod_id, scope)` within a single sending process. All fields are
/// frozen after construction — there is no setter, only [`ChatEvent::new`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Globally unique identifier for this message.
    pub message_id: Uuid,
    /// The scope type the message was sent to.
    pub scope_type: crate::scope::ScopeType,
    /// The scope id the message was sent to.
    pub scope_id: String,
    /// The user who sent the message (1..=256 non-whitespace characters).
    pub sender_id: String,
    /// The message body (0..=4096 bytes, valid UTF-8).
    pub text: String,
    /// When the message was stamped, per the injected clock.
    pub created_at_utc: DateTime<Utc>,
    /// The pod that stamped and published this event.
    pub origin_pod_id: String,
}

impl ChatEvent {
    /// Construct a new `ChatEvent`. This is the only way to build one — once
    /// constructed it is frozen.
    #[must_use]
    pub fn new(
        message_id: Uuid,
        scope: &ScopeKey,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        created_at_utc: DateTime<Utc>,
        origin_pod_id: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            scope_type: scope.scope_type,
            scope_id: scope.scope_id.as_str().to_string(),
            sender_id: sender_id.into(),
            text: text.into(),
            created_at_utc,
            origin_pod_id: origin_pod_id.into(),
        }
    }

    /// Reconstruct the [`ScopeKey`] this event belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if `scope_id` fails `ScopeId` validation. This
    /// should never happen for an event built via [`ChatEvent::new`], but a
    /// record read back from storage or the log is untrusted input.
    pub fn scope_key(&self) -> Result<ScopeKey, crate::scope::ParseScopeIdError> {
        Ok(ScopeKey::new(self.scope_type, self.scope_id.parse()?))
    }
}

/// A [`ChatEvent`] enriched with the partition/offset it was produced at or
/// consumed from.
///
/// Produced on successful publish, and reconstructed on consume from the
/// broker's delivery metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedChatEvent {
    /// The underlying event.
    pub event: ChatEvent,
    /// The log partition the event was published to / consumed from.
    pub partition: i32,
    /// The log offset within that partition.
    pub offset: i64,
}

impl EnrichedChatEvent {
    /// Pair a [`ChatEvent`] with its partition/offset.
    #[must_use]
    pub const fn new(event: ChatEvent, partition: i32, offset: i64) -> Self {
        Self {
            event,
            partition,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{ScopeId, ScopeType};

    fn sample_event() -> ChatEvent {
        let scope = ScopeKey::new(ScopeType::Channel, ScopeId::new_unchecked("scope-1"));
        ChatEvent::new(
            Uuid::nil(),
            &scope,
            "user-a",
            "Hello from A!",
            Utc::now(),
            "pod-1",
        )
    }

    #[test]
    fn json_round_trip_preserves_semantic_content() {
        let event = sample_event();
        let json = serde_json::to_string(&event).expect("serializes");
        let back: ChatEvent = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(event, back);
    }

    #[test]
    fn wire_format_uses_camel_case_fields() {
        let event = sample_event();
        let json = serde_json::to_value(&event).expect("serializes");
        let obj = json.as_object().expect("object");
        assert!(obj.contains_key("messageId"));
        assert!(obj.contains_key("scopeType"));
        assert!(obj.contains_key("scopeId"));
        assert!(obj.contains_key("senderId"));
        assert!(obj.contains_key("createdAtUtc"));
        assert!(obj.contains_key("originPodId"));
    }

    #[test]
    fn scope_key_round_trips_through_event() {
        let scope = ScopeKey::new(ScopeType::DirectMessage, ScopeId::new_unchecked("dm-7"));
        let event = ChatEvent::new(Uuid::nil(), &scope, "u", "hi", Utc::now(), "pod-1");
        assert_eq!(event.scope_key().expect("valid"), scope);
    }
}
