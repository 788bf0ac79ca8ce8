//! Credential provider seam.
//!
//! The session never sees token mechanics: it asks the provider for a
//! currently-valid bearer token exactly when the hub requests
//! authentication, once per connection.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// AccessTokenProvider
// ============================================================================

/// Source of bearer tokens for the authentication handshake.
///
/// Implementations may perform a network refresh internally; the call
/// must be safe to repeat and cheap while the token is still valid.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns a currently-valid bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenRefresh`](crate::Error::TokenRefresh) if no
    /// valid token can be obtained.
    async fn access_token(&self) -> Result<String>;
}

// Lets one provider back both the session and the REST client.
#[async_trait]
impl<P> AccessTokenProvider for Arc<P>
where
    P: AccessTokenProvider + ?Sized,
{
    async fn access_token(&self) -> Result<String> {
        (**self).access_token().await
    }
}

// ============================================================================
// LongLivedToken
// ============================================================================

/// Provider backed by a long-lived access token.
///
/// Long-lived tokens are issued by the hub UI and stay valid for years;
/// no refresh is ever attempted.
#[derive(Debug, Clone)]
pub struct LongLivedToken {
    token: String,
}

impl LongLivedToken {
    /// Wraps a long-lived access token.
    #[inline]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for LongLivedToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
