//! Typed inbound message payloads.
//!
//! Full decodes of the frames classified by
//! [`Envelope`](super::Envelope). Each type mirrors the hub's wire shape
//! exactly; unknown fields are ignored.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::SequenceId;

use super::MessageKind;

// ============================================================================
// ResultMessage
// ============================================================================

/// Reply to a numbered command.
///
/// # Format
///
/// Success:
/// ```json
/// {
///   "id": 18,
///   "type": "result",
///   "success": true,
///   "result": { ... }
/// }
/// ```
///
/// Failure:
/// ```json
/// {
///   "id": 18,
///   "type": "result",
///   "success": false,
///   "error": { "code": "unknown_command", "message": "..." }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ResultMessage {
    /// Matches the sequence id of the originating command.
    pub id: SequenceId,

    /// Message kind, always [`MessageKind::Result`].
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Whether the hub accepted the command.
    #[serde(default)]
    pub success: bool,

    /// Result data; `null` for commands without a payload.
    #[serde(default)]
    pub result: Value,

    /// Error detail when `success` is false.
    #[serde(default)]
    pub error: ResultError,
}

/// Error detail carried by a failed result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultError {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: String,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

impl ResultMessage {
    /// Returns `true` if the hub accepted the command.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Extracts the result value, returning an error on hub rejection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] carrying the hub's error code and
    /// message if `success` is false.
    pub fn into_result(self) -> Result<Value> {
        if self.success {
            Ok(self.result)
        } else {
            Err(Error::protocol(format!(
                "{}: {}",
                self.error.code, self.error.message
            )))
        }
    }

    /// Gets a string value from the result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a u64 value from the result.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.result
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }

    /// Gets a boolean value from the result.
    ///
    /// Returns false if key not found or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.result
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }
}

// ============================================================================
// EventMessage
// ============================================================================

/// Event bus delivery for an active subscription.
///
/// # Format
///
/// ```json
/// {
///   "id": 3,
///   "type": "event",
///   "event": {
///     "event_type": "state_changed",
///     "data": { ... }
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    /// Sequence id of the subscription that produced this event.
    pub id: SequenceId,

    /// Message kind, always [`MessageKind::Event`].
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Event payload.
    pub event: EventPayload,
}

/// Payload of a generic event delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    /// Domain-opaque event data.
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Event bus type, e.g. `state_changed`.
    #[serde(default)]
    pub event_type: String,
}

// ============================================================================
// PushNotificationMessage
// ============================================================================

/// Push notification delivered over the notification channel
/// subscription.
///
/// Shares the `event` kind with [`EventMessage`] on the wire; it is
/// distinguished by a non-empty `message` field.
///
/// # Format
///
/// ```json
/// {
///   "id": 4,
///   "type": "event",
///   "event": {
///     "title": "Door",
///     "message": "Front door open",
///     "data": { "actions": [{ "action": "open", "title": "Open" }] },
///     "hass_confirm_id": "..."
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PushNotificationMessage {
    /// Sequence id of the notification channel subscription.
    pub id: SequenceId,

    /// Message kind, always [`MessageKind::Event`].
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Notification payload.
    pub event: PushNotificationPayload,
}

/// Payload of a push notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushNotificationPayload {
    /// Notification title.
    #[serde(default)]
    pub title: String,

    /// Notification body; empty means the frame is a plain event.
    #[serde(default)]
    pub message: String,

    /// Delivery target, if addressed.
    #[serde(default)]
    pub target: String,

    /// Structured extras.
    #[serde(default)]
    pub data: PushNotificationData,

    /// Confirmation id to acknowledge receipt with, if requested.
    #[serde(default)]
    pub hass_confirm_id: String,
}

/// Structured extras attached to a push notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushNotificationData {
    /// Interactive actions offered by the notification.
    #[serde(default)]
    pub actions: Vec<PushNotificationAction>,
}

/// One interactive action of a push notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushNotificationAction {
    /// Action identifier reported back on activation.
    #[serde(default)]
    pub action: String,

    /// Button label.
    #[serde(default)]
    pub title: String,

    /// URI opened on activation, if any.
    #[serde(default)]
    pub uri: String,
}

impl PushNotificationMessage {
    /// Returns `true` if this frame is an actual notification rather
    /// than a plain event that merely decoded into this shape.
    #[inline]
    #[must_use]
    pub fn is_notification(&self) -> bool {
        !self.event.message.is_empty()
    }
}

// ============================================================================
// PongMessage
// ============================================================================

/// Heartbeat reply.
///
/// # Format
///
/// ```json
/// { "id": 27, "type": "pong" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PongMessage {
    /// Sequence id of the ping this answers.
    pub id: SequenceId,

    /// Message kind, always [`MessageKind::Pong`].
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

// ============================================================================
// AuthMessage
// ============================================================================

/// Authentication phase frame (`auth_required`, `auth_ok`,
/// `auth_invalid`). Auth frames carry no sequence id.
///
/// # Format
///
/// ```json
/// { "type": "auth_invalid", "message": "Invalid access token" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AuthMessage {
    /// Message kind, one of the three auth kinds.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Hub software version, sent with `auth_required` and `auth_ok`.
    #[serde(default)]
    pub ha_version: String,

    /// Rejection reason, sent with `auth_invalid`.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let json_str = r#"{
            "id": 18,
            "type": "result",
            "success": true,
            "result": {"latest_version": "2023.6.0"}
        }"#;

        let result: ResultMessage = serde_json::from_str(json_str).expect("parse");
        assert!(result.is_success());
        assert_eq!(result.id, SequenceId::new(18));
        assert_eq!(result.get_string("latest_version"), "2023.6.0");
    }

    #[test]
    fn test_error_result() {
        let json_str = r#"{
            "id": 18,
            "type": "result",
            "success": false,
            "error": {"code": "unknown_command", "message": "Unknown command."}
        }"#;

        let result: ResultMessage = serde_json::from_str(json_str).expect("parse");
        assert!(!result.is_success());
        assert_eq!(result.error.code, "unknown_command");

        let err = result.into_result().unwrap_err();
        assert!(err.to_string().contains("unknown_command"));
    }

    #[test]
    fn test_null_result_defaults() {
        let json_str = r#"{"id": 2, "type": "result", "success": true, "result": null}"#;

        let result: ResultMessage = serde_json::from_str(json_str).expect("parse");
        assert_eq!(result.clone().into_result().expect("success"), Value::Null);
        assert_eq!(result.get_string("missing"), "");
        assert_eq!(result.get_u64("missing"), 0);
        assert!(!result.get_bool("missing"));
    }

    #[test]
    fn test_event_decode() {
        let json_str = r#"{
            "id": 3,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": {"entity_id": "light.kitchen"}
            }
        }"#;

        let event: EventMessage = serde_json::from_str(json_str).expect("parse");
        assert_eq!(event.event.event_type, "state_changed");
        assert_eq!(
            event.event.data.get("entity_id").and_then(|v| v.as_str()),
            Some("light.kitchen")
        );
    }

    #[test]
    fn test_push_notification_decode() {
        let json_str = r#"{
            "id": 4,
            "type": "event",
            "event": {
                "title": "Door",
                "message": "Front door open",
                "data": {
                    "actions": [{"action": "unlock", "title": "Unlock", "uri": ""}]
                },
                "hass_confirm_id": "c0ffee"
            }
        }"#;

        let push: PushNotificationMessage = serde_json::from_str(json_str).expect("parse");
        assert!(push.is_notification());
        assert_eq!(push.event.title, "Door");
        assert_eq!(push.event.data.actions.len(), 1);
        assert_eq!(push.event.data.actions[0].action, "unlock");
        assert_eq!(push.event.hass_confirm_id, "c0ffee");
    }

    #[test]
    fn test_plain_event_is_not_notification() {
        let json_str = r#"{
            "id": 3,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": {}
            }
        }"#;

        let push: PushNotificationMessage = serde_json::from_str(json_str).expect("parse");
        assert!(!push.is_notification());
    }

    #[test]
    fn test_pong_decode() {
        let pong: PongMessage =
            serde_json::from_str(r#"{"id": 27, "type": "pong"}"#).expect("parse");
        assert_eq!(pong.id, SequenceId::new(27));
        assert_eq!(pong.kind, MessageKind::Pong);
    }

    #[test]
    fn test_auth_frames_decode() {
        let required: AuthMessage =
            serde_json::from_str(r#"{"type": "auth_required", "ha_version": "2024.6.1"}"#)
                .expect("parse");
        assert_eq!(required.kind, MessageKind::AuthRequired);
        assert_eq!(required.ha_version, "2024.6.1");
        assert_eq!(required.message, "");

        let invalid: AuthMessage =
            serde_json::from_str(r#"{"type": "auth_invalid", "message": "Invalid access token"}"#)
                .expect("parse");
        assert_eq!(invalid.kind, MessageKind::AuthInvalid);
        assert_eq!(invalid.message, "Invalid access token");
    }
}
