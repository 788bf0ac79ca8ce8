//! The long-lived hub session.
//!
//! A [`Session`] is one logical connection to the hub that survives the
//! loss of its underlying transport. Authentication, sequence ids,
//! fan-out channels, registered callbacks and standing subscriptions
//! all belong to the session; [`Session::redial`] swaps the transport
//! underneath them.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Session configuration and validation |
//! | `core` | Session handle, state machine, read loop, send paths |
//! | `monitor` | Heartbeat probes and pong-deadline detection |
//! | `registry` | Sequence ids and one-shot result callbacks |
//! | `supervisor` | Reconnect loop around a session |
//!
//! # Example
//!
//! ```ignore
//! let session = Session::builder()
//!     .server("http://homeassistant.local:8123")
//!     .credentials(LongLivedToken::new(token))
//!     .connect()
//!     .await?;
//!
//! // The supervisor owns the read loop, heartbeat and reconnects.
//! tokio::spawn(Supervisor::new(session.clone()).run());
//!
//! session.ready().await?;
//! session.send_command(Command::subscribe_events("state_changed")).await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod builder;
mod core;
mod monitor;
mod registry;
mod supervisor;

#[cfg(test)]
pub(crate) mod mock_hub;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::{Session, SessionState};
pub use registry::ResultCallback;
pub use supervisor::Supervisor;
