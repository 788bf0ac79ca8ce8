//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and connecting a [`Session`].
//!
//! # Example
//!
//! ```no_run
//! use hass_companion::{LongLivedToken, Session};
//!
//! # async fn example() -> hass_companion::Result<()> {
//! let session = Session::builder()
//!     .server("http://homeassistant.local:8123")
//!     .credentials(LongLivedToken::new("llat-..."))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::auth::AccessTokenProvider;
use crate::error::{Error, Result};
use crate::transport;

use super::core::{Session, SessionConfig};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on the TCP connect plus WebSocket upgrade.
pub(crate) const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default spacing between heartbeat probes.
pub(crate) const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// Default wait for a pong before the connection is declared dead.
pub(crate) const DEFAULT_PONG_DEADLINE: Duration = Duration::from_secs(1);

/// Default bound on reaching `Authenticated` after a dial.
pub(crate) const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause between reconnect attempts.
pub(crate) const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Clone)]
pub struct SessionBuilder {
    /// Hub base URL, `http(s)` or `ws(s)`.
    server: Option<String>,
    /// Token source for the authentication handshake.
    provider: Option<Arc<dyn AccessTokenProvider>>,
    handshake_timeout: Duration,
    ping_interval: Duration,
    pong_deadline: Duration,
    ready_timeout: Duration,
    reconnect_backoff: Duration,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("server", &self.server)
            .field("has_credentials", &self.provider.is_some())
            .field("handshake_timeout", &self.handshake_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("pong_deadline", &self.pong_deadline)
            .finish_non_exhaustive()
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a new builder with default timeouts and no endpoint.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            server: None,
            provider: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            pong_deadline: DEFAULT_PONG_DEADLINE,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }

    /// Sets the hub base URL.
    ///
    /// `http`/`https` URLs are converted to their WebSocket equivalents
    /// when dialing; any path is replaced with the hub's API path.
    ///
    /// # Arguments
    ///
    /// * `server` - Base URL (e.g., "http://homeassistant.local:8123")
    #[inline]
    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Sets the credential provider asked for a bearer token during the
    /// handshake.
    ///
    /// Pass an `Arc` clone to share one provider with a
    /// [`RestClient`](crate::RestClient).
    ///
    /// # Arguments
    ///
    /// * `provider` - Token source, e.g. [`LongLivedToken`](crate::LongLivedToken)
    #[inline]
    #[must_use]
    pub fn credentials(mut self, provider: impl AccessTokenProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Bounds the TCP connect plus WebSocket upgrade.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the spacing between heartbeat probes.
    #[inline]
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets how long a probe waits for its pong. Must stay shorter than
    /// the ping interval.
    #[inline]
    #[must_use]
    pub fn pong_deadline(mut self, deadline: Duration) -> Self {
        self.pong_deadline = deadline;
        self
    }

    /// Bounds how long the supervisor waits for authentication after a
    /// dial.
    #[inline]
    #[must_use]
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Sets the pause between reconnect attempts.
    #[inline]
    #[must_use]
    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Validates the configuration, dials the hub and returns the
    /// connected session in the `AuthRequired` state.
    ///
    /// Spawn [`Session::listen`] (or hand the session to a
    /// [`Supervisor`](super::Supervisor)) to drive the handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint or credentials are missing or
    ///   invalid
    /// - [`Error::Connection`] / [`Error::ConnectionTimeout`] if the
    ///   dial fails
    pub async fn connect(self) -> Result<Session> {
        let config = self.validate()?;
        Session::connect(config).await
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    fn validate(self) -> Result<SessionConfig> {
        let server = self.validate_server()?;
        let provider = self.validate_credentials()?;
        self.validate_intervals()?;

        Ok(SessionConfig {
            server,
            provider,
            handshake_timeout: self.handshake_timeout,
            ping_interval: self.ping_interval,
            pong_deadline: self.pong_deadline,
            ready_timeout: self.ready_timeout,
            reconnect_backoff: self.reconnect_backoff,
        })
    }

    /// Validates the server URL configuration.
    fn validate_server(&self) -> Result<Url> {
        let server = self.server.as_deref().ok_or_else(|| {
            Error::config(
                "Server URL is required. Use .server() to set it.\n\
                 Example: Session::builder().server(\"http://homeassistant.local:8123\")",
            )
        })?;

        let url = Url::parse(server)
            .map_err(|e| Error::config(format!("Invalid server URL `{server}`: {e}")))?;

        // Rejects unsupported schemes up front rather than at dial time.
        transport::websocket_url(&url)?;

        Ok(url)
    }

    /// Validates the credential configuration.
    fn validate_credentials(&self) -> Result<Arc<dyn AccessTokenProvider>> {
        self.provider.clone().ok_or_else(|| {
            Error::config(
                "Credentials are required. Use .credentials() to set them.\n\
                 Example: Session::builder().credentials(LongLivedToken::new(token))",
            )
        })
    }

    /// Validates the heartbeat timing relationship.
    fn validate_intervals(&self) -> Result<()> {
        if self.ping_interval.is_zero() || self.pong_deadline.is_zero() {
            return Err(Error::config(
                "Ping interval and pong deadline must be non-zero.",
            ));
        }
        if self.pong_deadline >= self.ping_interval {
            return Err(Error::config(format!(
                "Pong deadline ({:?}) must be shorter than the ping interval ({:?}), \
                 otherwise liveness verdicts overlap the next probe.",
                self.pong_deadline, self.ping_interval
            )));
        }
        if self.handshake_timeout.is_zero() {
            return Err(Error::config("Handshake timeout must be non-zero."));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
