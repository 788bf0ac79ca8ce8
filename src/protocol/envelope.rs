//! Inbound frame classification.
//!
//! Every frame the hub sends is JSON carrying at least an `id` and a
//! `type` field. [`Envelope`] decodes exactly that pair so the read loop
//! can route each frame to the right typed decoder without inspecting
//! the payload twice.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;

use crate::error::Result;
use crate::identifiers::SequenceId;

// ============================================================================
// MessageKind
// ============================================================================

/// Inbound message kind discriminator.
///
/// The set is closed: anything the hub sends outside it lands in
/// [`MessageKind::Unknown`] and is logged and discarded, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Hub requests authentication after the transport opens.
    AuthRequired,
    /// Credentials accepted.
    AuthOk,
    /// Credentials rejected.
    AuthInvalid,
    /// Event bus delivery for an active subscription.
    Event,
    /// Reply to a numbered command.
    Result,
    /// Heartbeat reply.
    Pong,
    /// Any kind this client does not understand.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Envelope
// ============================================================================

/// Minimal decode of an inbound frame.
///
/// # Format
///
/// ```json
/// {
///   "id": 42,
///   "type": "result",
///   ...
/// }
/// ```
///
/// The `id` defaults to 0 for the authentication frames the hub sends
/// without one.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Correlation id of the frame, 0 when absent.
    #[serde(default)]
    pub id: SequenceId,

    /// Classified message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl Envelope {
    /// Classifies a raw inbound payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload is not
    /// a JSON object with a string `type` field.
    #[inline]
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
