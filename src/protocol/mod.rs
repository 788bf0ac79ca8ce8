//! Wire protocol message types.
//!
//! This module defines the message format spoken over the hub's
//! WebSocket API. Inbound frames are classified first by a minimal
//! [`Envelope`] decode, then fully decoded into one typed message;
//! outbound frames serialize from a closed [`Command`] enum wrapped in a
//! [`CommandFrame`] that carries the sequence id.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `auth_required` / `auth_ok` / `auth_invalid` | Hub → Client | Authentication handshake |
//! | `AuthCommand` | Client → Hub | Present the bearer token |
//! | `CommandFrame` | Client → Hub | Numbered command |
//! | `result` | Hub → Client | Reply to a numbered command |
//! | `event` | Hub → Client | Subscription delivery (plain or push notification) |
//! | `ping` / `pong` | Client ↔ Hub | Liveness probe |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command catalog and frames |
//! | `envelope` | Inbound frame classification |
//! | `message` | Typed inbound payloads |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command definitions and frames.
pub mod command;

/// Inbound frame classification.
pub mod envelope;

/// Typed inbound message payloads.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{AuthCommand, Command, CommandFrame, ServiceTarget, Trigger};
pub use envelope::{Envelope, MessageKind};
pub use message::{
    AuthMessage, EventMessage, EventPayload, PongMessage, PushNotificationAction,
    PushNotificationData, PushNotificationMessage, PushNotificationPayload, ResultError,
    ResultMessage,
};

pub(crate) use command::OutboundFrame;
