//! One-shot REST calls to the hub.
//!
//! The WebSocket session covers everything stateful; the REST boundary
//! exists for the two calls that have no WebSocket equivalent: registering
//! this device as a mobile app (which yields the webhook id that push
//! notifications are keyed on) and posting commands to that webhook.
//!
//! ```no_run
//! # use hass_companion::{LongLivedToken, Registration, RestClient};
//! # async fn demo() -> hass_companion::Result<()> {
//! # let server = url::Url::parse("http://homeassistant.local:8123").unwrap();
//! let client = RestClient::new(server, LongLivedToken::new("token"));
//!
//! let registration = client
//!     .register_mobile_app(&Registration::new("my-desktop"))
//!     .await?;
//! let config = client.get_config(&registration.webhook_id).await?;
//! println!("hub config: {config}");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::auth::AccessTokenProvider;
use crate::error::{Error, Result};
use crate::identifiers::WebhookId;

// ============================================================================
// Constants
// ============================================================================

/// Path of the mobile app registration endpoint.
const REGISTRATION_PATH: &str = "/api/mobile_app/registrations";

/// Path prefix for webhook deliveries; the webhook id is appended.
const WEBHOOK_PATH: &str = "/api/webhook";

/// Application identity reported at registration.
const APP_ID: &str = "hass-companion";
const APP_NAME: &str = "Hass Companion";

// ============================================================================
// Registration
// ============================================================================

/// Device registration payload for the mobile app endpoint.
///
/// [`Registration::new`] fills everything except the device name with
/// defaults describing this build and host; all fields are public so
/// callers can override them before registering.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub device_id: String,
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub device_name: String,
    pub manufacturer: String,
    pub model: String,
    pub os_name: String,
    pub os_version: String,
    pub supports_encryption: bool,
    pub app_data: AppData,
}

/// Extra registration data interpreted by the hub's mobile app component.
#[derive(Debug, Clone, Serialize)]
pub struct AppData {
    /// Ask the hub to deliver push notifications over the WebSocket
    /// connection instead of a cloud push service.
    pub push_websocket_channel: bool,
}

impl Registration {
    /// Creates a registration for this build under `device_name`.
    ///
    /// The device id is a fresh v4 UUID, so registering twice creates two
    /// device entries; persist the id alongside the webhook id to re-use
    /// a registration.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            app_id: APP_ID.to_owned(),
            app_name: APP_NAME.to_owned(),
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            device_name: device_name.into(),
            manufacturer: String::new(),
            model: std::env::consts::ARCH.to_owned(),
            os_name: std::env::consts::OS.to_owned(),
            os_version: String::new(),
            supports_encryption: false,
            app_data: AppData {
                push_websocket_channel: true,
            },
        }
    }
}

/// Hub reply to a successful device registration.
///
/// The cloudhook and remote UI URLs are present only on cloud-connected
/// hubs; the webhook id always is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationResponse {
    #[serde(default)]
    pub cloudhook_url: String,
    #[serde(default)]
    pub remote_ui_url: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub webhook_id: WebhookId,
}

impl RegistrationResponse {
    /// Resolves the URL webhook commands should be delivered to.
    ///
    /// Preference order: the cloudhook URL (already routed to this
    /// webhook), then the remote UI URL, then `server`, the latter two
    /// with the webhook path appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the hub handed back an unparseable
    /// URL.
    pub fn webhook_url(&self, server: &Url) -> Result<Url> {
        if !self.cloudhook_url.is_empty() {
            return Url::parse(&self.cloudhook_url)
                .map_err(|e| Error::config(format!("invalid cloudhook url: {e}")));
        }

        let path = format!("{WEBHOOK_PATH}/{}", self.webhook_id);
        if !self.remote_ui_url.is_empty() {
            let mut url = Url::parse(&self.remote_ui_url)
                .map_err(|e| Error::config(format!("invalid remote ui url: {e}")))?;
            url.set_path(&path);
            return Ok(url);
        }

        let mut url = server.clone();
        url.set_path(&path);
        Ok(url)
    }
}

// ============================================================================
// WebhookCommand
// ============================================================================

/// Command posted to a registered webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookCommand {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl WebhookCommand {
    /// Creates a webhook command of `kind` with an optional data payload.
    pub fn new(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Requests the hub configuration visible to this device.
    pub fn get_config() -> Self {
        Self::new("get_config", None)
    }
}

// ============================================================================
// RestClient
// ============================================================================

/// HTTP client for the hub's REST endpoints.
///
/// Tokens come from the same [`AccessTokenProvider`] the session uses, so
/// a refreshed token is picked up here as well.
pub struct RestClient {
    server: Url,
    provider: Arc<dyn AccessTokenProvider>,
    http: reqwest::Client,
}

impl RestClient {
    /// Creates a client for the hub at `server`.
    pub fn new(server: Url, provider: impl AccessTokenProvider + 'static) -> Self {
        Self {
            server,
            provider: Arc::new(provider),
            http: reqwest::Client::new(),
        }
    }

    /// Hub base URL calls are made against.
    #[inline]
    #[must_use]
    pub fn server(&self) -> &Url {
        &self.server
    }

    /// Registers this device with the hub's mobile app component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on a non-success status and
    /// [`Error::Http`] if the hub is unreachable or the reply is not the
    /// expected JSON.
    pub async fn register_mobile_app(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationResponse> {
        let mut endpoint = self.server.clone();
        endpoint.set_path(REGISTRATION_PATH);

        debug!(device_name = %registration.device_name, "registering device");
        let token = self.provider.access_token().await?;
        let response = self
            .http
            .post(endpoint)
            .bearer_auth(token)
            .json(registration)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::protocol(format!(
                "device registration returned {status}"
            )));
        }

        Ok(response.json().await?)
    }

    /// Posts `command` to the webhook registered under `webhook_id`.
    ///
    /// Returns the decoded reply body, or [`Value::Null`] for commands the
    /// hub answers with an empty body.
    pub async fn send_webhook_command(
        &self,
        webhook_id: &WebhookId,
        command: &WebhookCommand,
    ) -> Result<Value> {
        let mut endpoint = self.server.clone();
        endpoint.set_path(&format!("{WEBHOOK_PATH}/{webhook_id}"));

        debug!(kind = %command.kind, %webhook_id, "sending webhook command");
        let token = self.provider.access_token().await?;
        let response = self
            .http
            .post(endpoint)
            .bearer_auth(token)
            .json(command)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::protocol(format!(
                "webhook command {} returned {status}",
                command.kind
            )));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetches the hub configuration through the registered webhook.
    pub async fn get_config(&self, webhook_id: &WebhookId) -> Result<Value> {
        self.send_webhook_command(webhook_id, &WebhookCommand::get_config())
            .await
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("server", &self.server.as_str())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use crate::auth::LongLivedToken;

    /// Serves one scripted JSON response on a local port and hands back
    /// the raw request it received.
    async fn scripted_endpoint(status: u16, body: &str) -> (Url, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let (tx, rx) = mpsc::unbounded_channel();
        let body = body.to_owned();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");

            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.expect("read");
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                    let content_length = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= pos + 4 + content_length {
                        break;
                    }
                }
            }
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());

            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.expect("write");
            stream.shutdown().await.expect("shutdown");
        });

        let url = Url::parse(&format!("http://127.0.0.1:{port}")).expect("url");
        (url, rx)
    }

    #[tokio::test]
    async fn test_register_mobile_app() {
        let (url, mut requests) = scripted_endpoint(
            200,
            r#"{"cloudhook_url":"","remote_ui_url":"","secret":"s3cret","webhook_id":"wh-1"}"#,
        )
        .await;

        let client = RestClient::new(url, LongLivedToken::new("test-token"));
        let response = client
            .register_mobile_app(&Registration::new("my-desktop"))
            .await
            .expect("register");

        assert_eq!(response.webhook_id, WebhookId::new("wh-1"));
        assert_eq!(response.secret, "s3cret");

        let request = requests.recv().await.expect("request");
        assert!(request.starts_with("POST /api/mobile_app/registrations"));
        assert!(
            request
                .to_ascii_lowercase()
                .contains("authorization: bearer test-token")
        );
        assert!(request.contains(r#""device_name":"my-desktop""#));
        assert!(request.contains(r#""push_websocket_channel":true"#));
    }

    #[tokio::test]
    async fn test_registration_failure_surfaces() {
        let (url, _requests) = scripted_endpoint(500, r#"{"message":"boom"}"#).await;

        let client = RestClient::new(url, LongLivedToken::new("test-token"));
        let err = client
            .register_mobile_app(&Registration::new("my-desktop"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_get_config_posts_webhook_command() {
        let (url, mut requests) =
            scripted_endpoint(200, r#"{"components":["mobile_app"],"version":"2024.1.0"}"#).await;

        let client = RestClient::new(url, LongLivedToken::new("test-token"));
        let config = client
            .get_config(&WebhookId::new("wh-9"))
            .await
            .expect("config");

        assert_eq!(config["version"], "2024.1.0");

        let request = requests.recv().await.expect("request");
        assert!(request.starts_with("POST /api/webhook/wh-9"));
        assert!(request.contains(r#""type":"get_config""#));
        // get_config carries no data payload.
        assert!(!request.contains(r#""data""#));
    }

    #[tokio::test]
    async fn test_empty_webhook_reply_is_null() {
        let (url, _requests) = scripted_endpoint(200, "").await;

        let client = RestClient::new(url, LongLivedToken::new("test-token"));
        let reply = client
            .send_webhook_command(&WebhookId::new("wh-2"), &WebhookCommand::new("update_location", None))
            .await
            .expect("reply");

        assert_eq!(reply, Value::Null);
    }

    #[test]
    fn test_registration_defaults() {
        let registration = Registration::new("my-desktop");

        assert_eq!(registration.device_name, "my-desktop");
        assert_eq!(registration.app_id, APP_ID);
        assert_eq!(registration.os_name, std::env::consts::OS);
        assert!(!registration.supports_encryption);
        assert!(registration.app_data.push_websocket_channel);
        // v4 UUID in canonical form.
        assert_eq!(registration.device_id.len(), 36);
        assert!(Uuid::parse_str(&registration.device_id).is_ok());
    }

    #[test]
    fn test_webhook_url_prefers_cloudhook() {
        let response = RegistrationResponse {
            cloudhook_url: "https://hooks.nabu.casa/abc".to_owned(),
            remote_ui_url: "https://remote.example".to_owned(),
            webhook_id: WebhookId::new("wh-1"),
            ..Default::default()
        };

        let server = Url::parse("http://homeassistant.local:8123").expect("url");
        let url = response.webhook_url(&server).expect("webhook url");
        assert_eq!(url.as_str(), "https://hooks.nabu.casa/abc");
    }

    #[test]
    fn test_webhook_url_falls_back_to_remote_ui() {
        let response = RegistrationResponse {
            remote_ui_url: "https://abc.ui.nabu.casa".to_owned(),
            webhook_id: WebhookId::new("wh-1"),
            ..Default::default()
        };

        let server = Url::parse("http://homeassistant.local:8123").expect("url");
        let url = response.webhook_url(&server).expect("webhook url");
        assert_eq!(url.as_str(), "https://abc.ui.nabu.casa/api/webhook/wh-1");
    }

    #[test]
    fn test_webhook_url_defaults_to_server() {
        let response = RegistrationResponse {
            webhook_id: WebhookId::new("wh-1"),
            ..Default::default()
        };

        let server = Url::parse("http://homeassistant.local:8123").expect("url");
        let url = response.webhook_url(&server).expect("webhook url");
        assert_eq!(
            url.as_str(),
            "http://homeassistant.local:8123/api/webhook/wh-1"
        );
    }

    #[test]
    fn test_invalid_cloudhook_url_is_a_config_error() {
        let response = RegistrationResponse {
            cloudhook_url: "not a url".to_owned(),
            ..Default::default()
        };

        let server = Url::parse("http://homeassistant.local:8123").expect("url");
        let err = response.webhook_url(&server).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
