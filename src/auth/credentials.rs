//! OAuth2 credentials with internal token refresh.
//!
//! The hub issues short-lived access tokens paired with a long-lived
//! refresh token. [`Credentials`] checks expiry before every handout and
//! refreshes over the hub's token endpoint only when needed, so the
//! session can ask for a token on every authentication handshake without
//! paying for a network round trip each time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

use super::AccessTokenProvider;

// ============================================================================
// Constants
// ============================================================================

/// Path of the hub's OAuth2 token endpoint.
const TOKEN_PATH: &str = "/auth/token";

// ============================================================================
// Credentials
// ============================================================================

/// OAuth2 token pair bound to one hub and client id.
///
/// Obtain one either from stored tokens ([`Credentials::new`]) or by
/// exchanging a one-time authorization code
/// ([`Credentials::from_authorization_code`]). Token state is mutated
/// only by the refresh path; concurrent callers serialize on it, so at
/// most one refresh is in flight at a time.
pub struct Credentials {
    server: Url,
    client_id: String,
    http: reqwest::Client,
    state: Mutex<TokenState>,
}

#[derive(Debug)]
struct TokenState {
    access_token: String,
    refresh_token: String,
    /// Unknown until the first refresh; treated as already expired.
    expires_at: Option<Instant>,
}

impl TokenState {
    fn is_expired(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() >= at)
    }

    fn apply(&mut self, response: TokenResponse) {
        self.access_token = response.access_token;
        // The refresh grant may omit the refresh token; keep the old one.
        if !response.refresh_token.is_empty() {
            self.refresh_token = response.refresh_token;
        }
        self.expires_at = Some(Instant::now() + Duration::from_secs(response.expires_in));
    }
}

/// Token endpoint reply for both grant types.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    refresh_token: String,
}

impl Credentials {
    /// Creates credentials from stored tokens.
    ///
    /// The access token is considered expired until the first refresh
    /// confirms a fresh expiry.
    pub fn new(
        server: Url,
        client_id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            server,
            client_id: client_id.into(),
            http: reqwest::Client::new(),
            state: Mutex::new(TokenState {
                access_token: access_token.into(),
                refresh_token: refresh_token.into(),
                expires_at: None,
            }),
        }
    }

    /// Exchanges a one-time authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenRefresh`] if the exchange is rejected or
    /// the endpoint is unreachable.
    pub async fn from_authorization_code(
        server: Url,
        client_id: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Self::new(server, client_id, "", "");
        let code = code.into();

        let response = credentials
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("client_id", &credentials.client_id),
            ])
            .await?;

        credentials.state.lock().await.apply(response);
        Ok(credentials)
    }

    /// Hub base URL these credentials authenticate against.
    #[inline]
    #[must_use]
    pub fn server(&self) -> &Url {
        &self.server
    }

    /// Refreshes the access token via the stored refresh token.
    async fn refresh(&self, state: &mut TokenState) -> Result<()> {
        if state.refresh_token.is_empty() {
            return Err(Error::token_refresh("no refresh token available"));
        }

        debug!("refreshing access token");
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &state.refresh_token),
                ("client_id", &self.client_id),
            ])
            .await?;

        state.apply(response);
        Ok(())
    }

    /// POSTs a form-encoded grant to the token endpoint.
    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut endpoint = self.server.clone();
        endpoint.set_path(TOKEN_PATH);

        let response = self
            .http
            .post(endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| Error::token_refresh(format!("token endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::token_refresh(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::token_refresh(format!("malformed token response: {e}")))
    }
}

#[async_trait]
impl AccessTokenProvider for Credentials {
    async fn access_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.is_expired() {
            self.refresh(&mut state).await?;
        }
        Ok(state.access_token.clone())
    }
}

// Token material stays out of debug output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server.as_str())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
