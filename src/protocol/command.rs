//! Outbound command definitions.
//!
//! Every command serializes to a single JSON text frame tagged by its
//! `type` field. The sequence id is not part of [`Command`]: it lives on
//! [`CommandFrame`] and is assigned by the session immediately before
//! transmission, so callers structurally cannot pick ids. The `auth`
//! frame is a separate type that carries no id at all.
//!
//! # Command Catalog
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `subscribe_events` | Subscribe to the event bus |
//! | `subscribe_trigger` | Subscribe to a state trigger |
//! | `fire_event` | Fire an event on the bus |
//! | `call_service` | Invoke a service |
//! | `get_states` | Snapshot of all entity states |
//! | `get_config` | Hub configuration |
//! | `get_services` | Service catalog |
//! | `ping` | Heartbeat probe |
//! | `mobile_app/push_notification_channel` | Attach the push channel |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::{SequenceId, WebhookId};

// ============================================================================
// Command
// ============================================================================

/// All outbound commands, tagged by wire `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Subscribe to the hub event bus.
    SubscribeEvents {
        /// Restrict to one event type; `None` subscribes to everything.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_type: Option<String>,
    },

    /// Subscribe to a trigger evaluated by the hub.
    SubscribeTrigger {
        /// Trigger condition.
        trigger: Trigger,
    },

    /// Fire an event on the hub event bus.
    FireEvent {
        /// Event bus type to fire.
        event_type: String,
        /// Event payload.
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        event_data: Map<String, Value>,
    },

    /// Invoke a service.
    CallService {
        /// Service domain, e.g. `light`.
        domain: String,
        /// Service name, e.g. `turn_on`.
        service: String,
        /// Service parameters.
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        service_data: Map<String, Value>,
        /// Entity the call addresses.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ServiceTarget>,
    },

    /// Request a snapshot of all entity states.
    GetStates,

    /// Request the hub configuration.
    GetConfig,

    /// Request the service catalog.
    GetServices,

    /// Heartbeat probe.
    Ping,

    /// Attach this session as a push notification channel for a
    /// registered device.
    #[serde(rename = "mobile_app/push_notification_channel")]
    PushNotificationChannel {
        /// Webhook id assigned at device registration.
        webhook_id: WebhookId,
        /// Whether confirmable delivery is supported.
        support_confirm: bool,
    },
}

impl Command {
    /// Subscribes to every event type.
    #[inline]
    #[must_use]
    pub fn subscribe_all_events() -> Self {
        Self::SubscribeEvents { event_type: None }
    }

    /// Subscribes to a single event type.
    #[inline]
    pub fn subscribe_events(event_type: impl Into<String>) -> Self {
        Self::SubscribeEvents {
            event_type: Some(event_type.into()),
        }
    }

    /// Requests a snapshot of all entity states.
    #[inline]
    #[must_use]
    pub fn get_states() -> Self {
        Self::GetStates
    }

    /// Requests the hub configuration.
    #[inline]
    #[must_use]
    pub fn get_config() -> Self {
        Self::GetConfig
    }

    /// Requests the service catalog.
    #[inline]
    #[must_use]
    pub fn get_services() -> Self {
        Self::GetServices
    }

    /// Heartbeat probe.
    #[inline]
    #[must_use]
    pub fn ping() -> Self {
        Self::Ping
    }

    /// Attaches the session as a push notification channel.
    #[inline]
    #[must_use]
    pub fn push_notification_channel(webhook_id: WebhookId, support_confirm: bool) -> Self {
        Self::PushNotificationChannel {
            webhook_id,
            support_confirm,
        }
    }

    /// Returns `true` for subscription-class commands.
    ///
    /// These are recorded by the session and replayed with fresh ids
    /// after every successful redial.
    #[inline]
    #[must_use]
    pub fn is_subscription(&self) -> bool {
        matches!(
            self,
            Self::SubscribeEvents { .. }
                | Self::SubscribeTrigger { .. }
                | Self::PushNotificationChannel { .. }
        )
    }
}

// ============================================================================
// Trigger
// ============================================================================

/// Trigger condition for `subscribe_trigger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger platform, e.g. `state`.
    pub platform: String,

    /// Entity observed by the trigger.
    pub entity_id: String,

    /// Previous state to match, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// New state to match, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl Trigger {
    /// Creates a state trigger on an entity.
    #[inline]
    pub fn state(entity_id: impl Into<String>) -> Self {
        Self {
            platform: "state".to_string(),
            entity_id: entity_id.into(),
            from: None,
            to: None,
        }
    }
}

// ============================================================================
// ServiceTarget
// ============================================================================

/// Target entity of a service call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTarget {
    /// Entity the service call addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl ServiceTarget {
    /// Targets a single entity.
    #[inline]
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
        }
    }
}

// ============================================================================
// CommandFrame
// ============================================================================

/// A numbered command as transmitted on the wire.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "type": "call_service",
///   ...
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFrame {
    /// Sequence id assigned immediately before transmission.
    pub id: SequenceId,

    /// Command body.
    #[serde(flatten)]
    pub command: Command,
}

impl CommandFrame {
    /// Creates a frame with an assigned sequence id.
    #[inline]
    #[must_use]
    pub fn new(id: SequenceId, command: Command) -> Self {
        Self { id, command }
    }
}

// ============================================================================
// AuthCommand
// ============================================================================

/// Authentication frame sent in reply to `auth_required`.
///
/// # Format
///
/// ```json
/// { "type": "auth", "access_token": "..." }
/// ```
///
/// Deliberately not a [`Command`] variant: auth frames are the only
/// outbound frames without a sequence id.
#[derive(Debug, Clone, Serialize)]
pub struct AuthCommand {
    #[serde(rename = "type")]
    kind: &'static str,

    /// Bearer token presented to the hub.
    pub access_token: String,
}

impl AuthCommand {
    /// Creates an auth frame carrying the given token.
    #[inline]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            kind: "auth",
            access_token: access_token.into(),
        }
    }
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// Everything the write loop serializes onto the transport.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum OutboundFrame {
    /// Unnumbered authentication frame.
    Auth(AuthCommand),
    /// Numbered command frame.
    Command(CommandFrame),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_ping_frame_shape() {
        let frame = CommandFrame::new(SequenceId::new(7), Command::ping());
        let json = serde_json::to_string(&frame).expect("serialize");
        assert_eq!(json, r#"{"id":7,"type":"ping"}"#);
    }

    #[test]
    fn test_auth_frame_shape() {
        let auth = AuthCommand::new("llat-token");
        let value = serde_json::to_value(&auth).expect("serialize");
        assert_eq!(value, json!({"type": "auth", "access_token": "llat-token"}));
    }

    #[test]
    fn test_subscribe_events_omits_empty_event_type() {
        let json = serde_json::to_string(&Command::subscribe_all_events()).expect("serialize");
        assert_eq!(json, r#"{"type":"subscribe_events"}"#);

        let json =
            serde_json::to_string(&Command::subscribe_events("state_changed")).expect("serialize");
        assert!(json.contains(r#""event_type":"state_changed""#));
    }

    #[test]
    fn test_subscribe_trigger_serialization() {
        let mut trigger = Trigger::state("binary_sensor.front_door");
        trigger.to = Some("on".to_string());

        let value = serde_json::to_value(Command::SubscribeTrigger { trigger }).expect("serialize");
        assert_eq!(value["type"], "subscribe_trigger");
        assert_eq!(value["trigger"]["platform"], "state");
        assert_eq!(value["trigger"]["entity_id"], "binary_sensor.front_door");
        assert_eq!(value["trigger"]["to"], "on");
        assert!(value["trigger"].get("from").is_none());
    }

    #[test]
    fn test_call_service_round_trip() {
        let mut service_data = Map::new();
        service_data.insert("brightness".to_string(), json!(128));

        let frame = CommandFrame::new(
            SequenceId::new(42),
            Command::CallService {
                domain: "light".to_string(),
                service: "turn_on".to_string(),
                service_data,
                target: Some(ServiceTarget::entity("light.kitchen")),
            },
        );

        let encoded = serde_json::to_string(&frame).expect("serialize");
        let decoded: CommandFrame = serde_json::from_str(&encoded).expect("parse");

        assert_eq!(decoded.id, SequenceId::new(42));
        assert_eq!(
            serde_json::to_value(&decoded).expect("re-serialize"),
            serde_json::to_value(&frame).expect("serialize")
        );
    }

    #[test]
    fn test_push_notification_channel_tag() {
        let command = Command::push_notification_channel(WebhookId::new("hook-1"), true);
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(value["type"], "mobile_app/push_notification_channel");
        assert_eq!(value["webhook_id"], "hook-1");
        assert_eq!(value["support_confirm"], true);
    }

    #[test]
    fn test_is_subscription() {
        assert!(Command::subscribe_all_events().is_subscription());
        assert!(
            Command::SubscribeTrigger {
                trigger: Trigger::state("light.kitchen"),
            }
            .is_subscription()
        );
        assert!(Command::push_notification_channel(WebhookId::new("h"), false).is_subscription());

        assert!(!Command::ping().is_subscription());
        assert!(!Command::get_states().is_subscription());
    }

    #[test]
    fn test_outbound_frame_untagged() {
        let auth = OutboundFrame::Auth(AuthCommand::new("tok"));
        let value = serde_json::to_value(&auth).expect("serialize");
        assert!(value.get("id").is_none());

        let command = OutboundFrame::Command(CommandFrame::new(SequenceId::new(1), Command::ping()));
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(value["id"], 1);
    }
}
