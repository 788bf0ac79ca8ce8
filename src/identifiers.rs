//! Type-safe identifiers for session entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//! [`SequenceId`] is the 64-bit monotonic command identifier used for
//! request/response correlation on the wire; [`WebhookId`] names the
//! webhook endpoint assigned to a registered device.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// SequenceId
// ============================================================================

/// Monotonic command sequence identifier.
///
/// Assigned by the session immediately before transmission, starting at 1
/// and strictly increasing for the lifetime of the session. Never reused,
/// including across redials, so a stale in-flight reply cannot collide
/// with a newer command. The default value 0 marks frames the hub sends
/// without an id (the authentication phase).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceId(i64);

impl SequenceId {
    /// Creates a sequence id from a raw wire value.
    #[inline]
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw wire value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceId {
    #[inline]
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// WebhookId
// ============================================================================

/// Webhook identifier assigned by the hub at device registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookId(String);

impl WebhookId {
    /// Creates a webhook id.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WebhookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WebhookId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for WebhookId {
    #[inline]
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

// ============================================================================
// Tests
// ============================================================================
