//! Companion client for a Home Assistant style automation hub.
//!
//! This library maintains a long-lived, authenticated WebSocket session
//! to a hub, multiplexing commands and their results over one connection
//! while events and push notifications stream in between them.
//!
//! # Architecture
//!
//! The client is built around a single cloneable [`Session`] handle:
//!
//! - **Session**: owns the connection, numbers outbound commands with
//!   monotonically increasing sequence ids, and drives the
//!   authentication handshake from inbound auth frames
//! - **Read loop** ([`Session::listen`]): classifies every inbound frame
//!   and fans it out to typed broadcast channels or a registered
//!   one-shot callback
//! - **Heartbeat monitor** ([`Session::monitor_connection`]): pings the
//!   hub on an interval and raises a timeout signal when a reply misses
//!   its deadline
//! - **Supervisor** ([`Supervisor::run`]): redials after disconnects and
//!   heartbeat timeouts, replaying standing subscriptions; channels,
//!   callbacks, and the id sequence survive every reconnect
//!
//! # Quick Start
//!
//! ```no_run
//! use hass_companion::{Command, LongLivedToken, Result, Session, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::builder()
//!         .server("http://homeassistant.local:8123")
//!         .credentials(LongLivedToken::new("your-access-token"))
//!         .connect()
//!         .await?;
//!
//!     // Subscribe before spawning the supervisor so no event is missed.
//!     let mut events = session.events();
//!     tokio::spawn(Supervisor::new(session.clone()).run());
//!
//!     session.ready().await?;
//!     session
//!         .send_command(Command::subscribe_events("state_changed"))
//!         .await?;
//!
//!     // Print the next few state changes.
//!     for _ in 0..5 {
//!         if let Ok(event) = events.recv().await {
//!             println!("{}: {:?}", event.event.event_type, event.event.data);
//!         }
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Credential providers: [`LongLivedToken`], [`Credentials`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`rest`] | One-shot REST calls (device registration, webhooks) |
//! | [`session`] | The session, its builder, monitor, and supervisor |
//!
//! # Features
//!
//! - **Transparent reconnect**: subscribers and pending callbacks live on
//!   the session, not the connection
//! - **Request/response over one socket**: sequence ids correlate every
//!   result with its command
//! - **Liveness detection**: missed heartbeats tear the connection down
//!   instead of letting it hang half-open
//! - **WebSocket push notifications**: no cloud push service required

// ============================================================================
// Modules
// ============================================================================

/// Credential providers.
///
/// The session takes anything implementing [`AccessTokenProvider`];
/// [`LongLivedToken`] wraps a static token, [`Credentials`] refreshes an
/// OAuth2 pair.
pub mod auth;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// Outbound commands, inbound typed messages, and the envelope
/// classification between them.
pub mod protocol;

/// One-shot REST calls.
///
/// Device registration and webhook commands; everything stateful goes
/// over the WebSocket session instead.
pub mod rest;

/// The session and its supporting machinery.
///
/// Use [`Session::builder()`] to connect, then hand a clone to a
/// [`Supervisor`] to keep it alive.
pub mod session;

/// WebSocket dial and write loop.
mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Credential providers
pub use auth::{AccessTokenProvider, Credentials, LongLivedToken};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{SequenceId, WebhookId};

// Protocol types
pub use protocol::{
    AuthCommand, AuthMessage, Command, CommandFrame, Envelope, EventMessage, EventPayload,
    MessageKind, PongMessage, PushNotificationAction, PushNotificationData,
    PushNotificationMessage, PushNotificationPayload, ResultError, ResultMessage, ServiceTarget,
    Trigger,
};

// REST types
pub use rest::{AppData, Registration, RegistrationResponse, RestClient, WebhookCommand};

// Session types
pub use session::{ResultCallback, Session, SessionBuilder, SessionState, Supervisor};
