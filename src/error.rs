//! Error types for the hub session client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use hass_companion::{Result, Command, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     session.ready().await?;
//!     session.send_command(Command::get_states()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::SessionClosed`] |
//! | Authentication | [`Error::NotAuthenticated`], [`Error::AuthInvalid`], [`Error::TokenRefresh`] |
//! | Liveness | [`Error::PongTimeout`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the transport to the hub cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout during the WebSocket handshake.
    ///
    /// Returned when the hub does not complete the handshake in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Session has been closed.
    ///
    /// Returned when an operation is attempted after teardown.
    #[error("Session closed")]
    SessionClosed,

    // ========================================================================
    // Authentication Errors
    // ========================================================================
    /// Command issued while the session is not authenticated.
    ///
    /// Returned synchronously by send operations before the handshake
    /// completes or after authentication is lost.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Hub rejected the supplied credentials.
    ///
    /// Never retried automatically: a rejected token does not become
    /// valid by redialing.
    #[error("Authentication rejected: {message}")]
    AuthInvalid {
        /// Rejection detail reported by the hub, if any.
        message: String,
    },

    /// Token refresh or exchange against the hub failed.
    ///
    /// Returned by the credential provider when a new access token
    /// cannot be obtained.
    #[error("Token refresh failed: {message}")]
    TokenRefresh {
        /// Description of the refresh failure.
        message: String,
    },

    // ========================================================================
    // Liveness Errors
    // ========================================================================
    /// No pong received within the heartbeat deadline.
    ///
    /// Indicates a half-open connection; triggers supervised reconnect.
    #[error("Heartbeat timeout: no pong within deadline")]
    PongTimeout,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or invalid usage of the session.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON decode or encode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from the REST boundary.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates an authentication rejection error.
    #[inline]
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::AuthInvalid {
            message: message.into(),
        }
    }

    /// Creates a token refresh error.
    #[inline]
    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::TokenRefresh {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::PongTimeout)
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::PongTimeout
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is an authentication error.
    #[inline]
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::AuthInvalid { .. } | Self::TokenRefresh { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry or after a redial;
    /// a rejected token is explicitly not recoverable.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::PongTimeout
                | Self::NotAuthenticated
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
