//! WebSocket transport layer.
//!
//! This module owns everything that touches the raw socket: deriving the
//! WebSocket endpoint from the hub's base URL, dialing with a bounded
//! handshake timeout, and the single-writer loop that drains the
//! outbound queue.
//!
//! # Connection Flow
//!
//! 1. Derive the endpoint: `http(s)://hub` becomes `ws(s)://hub/api/websocket`
//! 2. Dial and complete the WebSocket handshake under a timeout
//! 3. Split the connection; the session parks the read half and hands
//!    the write half to a spawned write loop
//! 4. The write loop drains the outbound queue until told to quit, then
//!    hands the queue receiver back for the next connection's writer

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::SinkExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::OutboundFrame;

// ============================================================================
// Constants
// ============================================================================

/// Path of the hub's WebSocket API.
const WEBSOCKET_PATH: &str = "/api/websocket";

// ============================================================================
// Type Aliases
// ============================================================================

/// A live WebSocket connection to the hub, TLS or plain.
pub(crate) type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a split connection.
pub(crate) type WsSink = SplitSink<WsConnection, Message>;

/// Read half of a split connection.
pub(crate) type WsStream = SplitStream<WsConnection>;

// ============================================================================
// Endpoint Derivation
// ============================================================================

/// Derives the WebSocket endpoint from the hub base URL.
///
/// `http` maps to `ws`, `https` to `wss`; `ws`/`wss` pass through. Any
/// path on the base URL is replaced with the API path.
///
/// # Errors
///
/// Returns [`Error::Config`] for unsupported schemes.
pub(crate) fn websocket_url(server: &Url) -> Result<Url> {
    let mut url = server.clone();
    let scheme = match server.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => server.scheme(),
        other => {
            return Err(Error::config(format!(
                "unsupported server url scheme: {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::config("cannot derive websocket scheme"))?;
    url.set_path(WEBSOCKET_PATH);
    url.set_query(None);
    Ok(url)
}

// ============================================================================
// Dial
// ============================================================================

/// Dials the hub and completes the WebSocket handshake.
///
/// # Errors
///
/// - [`Error::ConnectionTimeout`] if the handshake does not complete
///   within `handshake_timeout`
/// - [`Error::Connection`] if the dial or upgrade fails
/// - [`Error::Config`] if the endpoint cannot be derived
pub(crate) async fn dial(server: &Url, handshake_timeout: Duration) -> Result<WsConnection> {
    let ws_url = websocket_url(server)?;
    debug!(url = %ws_url, "dialing hub");

    let dial_result = timeout(handshake_timeout, connect_async(ws_url.as_str())).await;

    let (connection, _response) = dial_result
        .map_err(|_| Error::connection_timeout(handshake_timeout.as_millis() as u64))?
        .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

    info!(url = %ws_url, "hub connection established");

    Ok(connection)
}

// ============================================================================
// WriterHandle
// ============================================================================

/// Handle to a running write loop.
///
/// The write loop is the only component that ever touches the write half
/// of the transport; everything else enqueues frames on the outbound
/// queue. Stopping is awaited so the transport can be replaced without
/// two writers alive at once.
pub(crate) struct WriterHandle {
    quit_tx: oneshot::Sender<()>,
    task: JoinHandle<mpsc::Receiver<OutboundFrame>>,
}

impl WriterHandle {
    /// Spawns a write loop over the given sink and outbound queue.
    pub(crate) fn spawn(sink: WsSink, outbox: mpsc::Receiver<OutboundFrame>) -> Self {
        let (quit_tx, quit_rx) = oneshot::channel();
        let task = tokio::spawn(write_loop(sink, outbox, quit_rx));
        Self { quit_tx, task }
    }

    /// Stops the write loop and hands back the outbound queue receiver.
    ///
    /// Frames still buffered in the queue survive and are drained by the
    /// next writer after a redial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the write loop task did not run to
    /// completion; the queue receiver is lost with it.
    pub(crate) async fn stop(self) -> Result<mpsc::Receiver<OutboundFrame>> {
        let _ = self.quit_tx.send(());
        self.task
            .await
            .map_err(|e| Error::protocol(format!("write loop task failed: {e}")))
    }
}

/// Drains the outbound queue onto the transport, one text frame per
/// command, until told to quit or the queue closes.
async fn write_loop(
    mut sink: WsSink,
    mut outbox: mpsc::Receiver<OutboundFrame>,
    mut quit_rx: oneshot::Receiver<()>,
) -> mpsc::Receiver<OutboundFrame> {
    debug!("write loop started");
    loop {
        tokio::select! {
            _ = &mut quit_rx => {
                debug!("write loop stopped");
                return outbox;
            }
            frame = outbox.recv() => {
                let Some(frame) = frame else {
                    debug!("outbound queue closed");
                    return outbox;
                };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to encode outbound frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    // The read loop is the component that detects a dead
                    // transport; the writer keeps draining.
                    warn!(error = %e, "write failed");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
