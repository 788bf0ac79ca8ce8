//! In-process hub for exercising sessions over real sockets.
//!
//! Test-only. Binds an ephemeral listener, accepts WebSocket upgrades
//! and lets each test script the hub side of the conversation frame by
//! frame.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use url::Url;

/// Initializes test logging once; respects `RUST_LOG`.
pub(crate) fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A listening hub endpoint. Accepts any number of connections, which
/// lets tests cover redials.
pub(crate) struct MockHub {
    listener: TcpListener,
    url: Url,
}

impl MockHub {
    pub(crate) async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}")).expect("url");
        Self { listener, url }
    }

    /// Base URL in the form sessions are configured with.
    pub(crate) fn url(&self) -> Url {
        self.url.clone()
    }

    /// Accepts the next connection and completes the WebSocket upgrade.
    pub(crate) async fn accept(&self) -> HubConnection {
        let (stream, _) = self.listener.accept().await.expect("accept");
        let ws = accept_async(stream).await.expect("upgrade");
        HubConnection { ws }
    }
}

/// One scripted hub-side connection.
pub(crate) struct HubConnection {
    ws: WebSocketStream<TcpStream>,
}

impl HubConnection {
    pub(crate) async fn send(&mut self, raw: &str) {
        self.ws
            .send(Message::Text(raw.to_string().into()))
            .await
            .expect("hub send");
    }

    /// Next text frame from the client, or `None` once the connection
    /// is gone.
    pub(crate) async fn recv(&mut self) -> Option<String> {
        while let Some(frame) = self.ws.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
        None
    }

    pub(crate) async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let text = self.recv().await?;
        Some(serde_json::from_str(&text).expect("client sent invalid json"))
    }

    /// Runs the hub side of the handshake: requests authentication,
    /// verifies the presented token and confirms.
    pub(crate) async fn authenticate(&mut self, expected_token: &str) {
        self.send(r#"{"type": "auth_required", "ha_version": "2024.6.1"}"#)
            .await;
        let auth = self.recv_json().await.expect("auth frame");
        assert_eq!(auth["type"], "auth");
        assert_eq!(auth["access_token"], expected_token);
        assert!(auth.get("id").is_none(), "auth frames must carry no id");
        self.send(r#"{"type": "auth_ok", "ha_version": "2024.6.1"}"#).await;
    }

    /// Answers pings with matching pongs until the connection ends.
    pub(crate) async fn pong_forever(mut self) {
        while let Some(frame) = self.recv_json().await {
            if frame["type"] == "ping" {
                let id = frame["id"].as_i64().expect("ping id");
                self.send(&format!(r#"{{"id": {id}, "type": "pong"}}"#)).await;
            }
        }
    }

    /// Next non-ping frame; pings on the way are answered so heartbeat
    /// traffic does not interfere with the scripted exchange.
    pub(crate) async fn recv_command(&mut self) -> Option<serde_json::Value> {
        while let Some(frame) = self.recv_json().await {
            if frame["type"] == "ping" {
                let id = frame["id"].as_i64().expect("ping id");
                self.send(&format!(r#"{{"id": {id}, "type": "pong"}}"#)).await;
                continue;
            }
            return Some(frame);
        }
        None
    }

    /// Closes the connection with a proper WebSocket close frame.
    pub(crate) async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Drops the connection without a close frame, as a crashed hub
    /// would.
    pub(crate) fn abort(self) {}
}
