//! Session handle and state machine.
//!
//! The [`Session`] is a cheaply cloneable handle over shared state: the
//! transport slots, the outbound queue, the command registry, the
//! fan-out channels and the state watch. The read loop classifies every
//! inbound frame and routes it to a callback or channel; senders enqueue
//! frames for the single write loop. Closing tears everything down
//! exactly once; redialing replaces only the transport.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::auth::AccessTokenProvider;
use crate::error::{Error, Result};
use crate::identifiers::SequenceId;
use crate::protocol::{
    AuthCommand, AuthMessage, Command, CommandFrame, Envelope, EventMessage, MessageKind,
    OutboundFrame, PongMessage, PushNotificationMessage, ResultMessage,
};
use crate::transport::{self, WriterHandle, WsStream};

use super::builder::SessionBuilder;
use super::registry::CommandRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Fan-out capacity for event deliveries.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Fan-out capacity for command results no callback claimed.
const RESULT_CHANNEL_CAPACITY: usize = 1000;

/// Fan-out capacity for push notifications.
const PUSH_CHANNEL_CAPACITY: usize = 1000;

/// Fan-out capacity for heartbeat replies.
const PONG_CHANNEL_CAPACITY: usize = 16;

/// One pending liveness verdict is all a consumer ever acts on.
const PONG_TIMEOUT_CHANNEL_CAPACITY: usize = 1;

/// Bounded queue between command senders and the write loop.
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle of a session, observable through [`Session::state`] and
/// [`Session::state_changes`].
///
/// A redial moves an established session back to `Dialing` and then
/// `AuthRequired`; `Faulted` marks a lost transport or rejected
/// credentials and is left again by the next successful redial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The transport is being established.
    Dialing,
    /// Connected; the hub has not been answered yet.
    AuthRequired,
    /// The access token has been presented; awaiting the verdict.
    Authenticating,
    /// The handshake completed; commands may be sent.
    Authenticated,
    /// Teardown is in progress.
    Closing,
    /// The session is finished; it cannot be reused.
    Closed,
    /// The transport was lost or the credentials were rejected.
    Faulted,
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Validated configuration handed over by the builder.
pub(crate) struct SessionConfig {
    pub(crate) server: Url,
    pub(crate) provider: Arc<dyn AccessTokenProvider>,
    pub(crate) handshake_timeout: Duration,
    pub(crate) ping_interval: Duration,
    pub(crate) pong_deadline: Duration,
    pub(crate) ready_timeout: Duration,
    pub(crate) reconnect_backoff: Duration,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("server", &self.server.as_str())
            .field("handshake_timeout", &self.handshake_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("pong_deadline", &self.pong_deadline)
            .field("ready_timeout", &self.ready_timeout)
            .field("reconnect_backoff", &self.reconnect_backoff)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ChannelSet
// ============================================================================

/// The broadcast senders behind the subscription accessors.
///
/// Held in an `Option` slot so that closing the session can drop all
/// senders at once; subscribers then observe closed channels.
pub(crate) struct ChannelSet {
    pub(crate) events_tx: broadcast::Sender<EventMessage>,
    pub(crate) push_tx: broadcast::Sender<PushNotificationMessage>,
    pub(crate) results_tx: broadcast::Sender<ResultMessage>,
    pub(crate) pongs_tx: broadcast::Sender<PongMessage>,
    pub(crate) pong_timeouts_tx: broadcast::Sender<()>,
}

impl ChannelSet {
    fn new() -> Self {
        Self {
            events_tx: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            push_tx: broadcast::channel(PUSH_CHANNEL_CAPACITY).0,
            results_tx: broadcast::channel(RESULT_CHANNEL_CAPACITY).0,
            pongs_tx: broadcast::channel(PONG_CHANNEL_CAPACITY).0,
            pong_timeouts_tx: broadcast::channel(PONG_TIMEOUT_CHANNEL_CAPACITY).0,
        }
    }
}

// ============================================================================
// SessionInner
// ============================================================================

/// Shared state behind every [`Session`] clone.
pub(crate) struct SessionInner {
    pub(crate) config: SessionConfig,
    pub(crate) state_tx: watch::Sender<SessionState>,
    pub(crate) registry: CommandRegistry,
    pub(crate) outbox_tx: mpsc::Sender<OutboundFrame>,
    /// Parks the queue receiver between writers.
    pub(crate) outbox_slot: Mutex<Option<mpsc::Receiver<OutboundFrame>>>,
    /// Parks the read half until [`Session::listen`] takes it.
    pub(crate) reader_slot: Mutex<Option<WsStream>>,
    pub(crate) writer_slot: Mutex<Option<WriterHandle>>,
    pub(crate) read_quit: Mutex<Option<oneshot::Sender<()>>>,
    pub(crate) monitor_quit: Mutex<Option<oneshot::Sender<()>>>,
    pub(crate) channels: Mutex<Option<ChannelSet>>,
    /// Subscription-class commands to replay after a redial.
    pub(crate) subscriptions: Mutex<Vec<Command>>,
    pub(crate) closed: AtomicBool,
    pub(crate) last_error: Mutex<Option<Arc<Error>>>,
}

// ============================================================================
// Session
// ============================================================================

/// One logical connection to the hub.
///
/// Cloning is cheap and every clone refers to the same session. The
/// handle stays valid across [`redial`](Session::redial): sequence ids,
/// subscriber channels, registered callbacks and standing subscriptions
/// all survive the transport swap.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("server", &self.inner.config.server.as_str())
            .field("state", &self.state())
            .field("pending_callbacks", &self.pending_callbacks())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Construction
// ============================================================================

impl Session {
    /// Starts building a session.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Dials the hub and returns the connected session in the
    /// `AuthRequired` state. Called by [`SessionBuilder::connect`].
    pub(crate) async fn connect(config: SessionConfig) -> Result<Self> {
        let session = Self::new(config);
        session.establish().await?;
        Ok(session)
    }

    fn new(config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Dialing);
        let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        Self {
            inner: Arc::new(SessionInner {
                config,
                state_tx,
                registry: CommandRegistry::new(),
                outbox_tx,
                outbox_slot: Mutex::new(Some(outbox_rx)),
                reader_slot: Mutex::new(None),
                writer_slot: Mutex::new(None),
                read_quit: Mutex::new(None),
                monitor_quit: Mutex::new(None),
                channels: Mutex::new(Some(ChannelSet::new())),
                subscriptions: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Tears down any current transport and dials a fresh one.
    ///
    /// The outbound queue receiver is reclaimed from the old writer and
    /// handed to the new one, so frames buffered across the swap are not
    /// lost.
    async fn establish(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }

        if let Some(quit) = self.inner.read_quit.lock().take() {
            let _ = quit.send(());
        }

        let writer = self.inner.writer_slot.lock().take();
        let outbox = match writer {
            Some(writer) => writer.stop().await?,
            None => match self.inner.outbox_slot.lock().take() {
                Some(outbox) => outbox,
                None => return Err(Error::SessionClosed),
            },
        };
        self.inner.reader_slot.lock().take();

        self.set_state(SessionState::Dialing);
        let connection =
            match transport::dial(&self.inner.config.server, self.inner.config.handshake_timeout)
                .await
            {
                Ok(connection) => connection,
                Err(e) => {
                    *self.inner.outbox_slot.lock() = Some(outbox);
                    self.set_state(SessionState::Faulted);
                    return Err(e);
                }
            };

        let (sink, stream) = connection.split();
        *self.inner.reader_slot.lock() = Some(stream);
        *self.inner.writer_slot.lock() = Some(WriterHandle::spawn(sink, outbox));

        // A close that raced the dial owns the teardown from here.
        if self.is_closed() {
            let writer = self.inner.writer_slot.lock().take();
            if let Some(writer) = writer {
                drop(writer.stop().await?);
            }
            self.inner.reader_slot.lock().take();
            return Err(Error::SessionClosed);
        }

        self.set_state(SessionState::AuthRequired);
        Ok(())
    }
}

// ============================================================================
// Read Loop
// ============================================================================

impl Session {
    /// Runs the read loop until the connection ends.
    ///
    /// Takes exclusive ownership of the read half; there is never more
    /// than one read loop per transport. Usually spawned:
    ///
    /// ```ignore
    /// let reader = session.clone();
    /// tokio::spawn(async move { reader.listen().await });
    /// ```
    ///
    /// Returns `Ok(())` when the loop is stopped by [`close`] or
    /// [`redial`], or when the hub closes the connection cleanly.
    ///
    /// [`close`]: Session::close
    /// [`redial`]: Session::redial
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the read loop is already running or no
    ///   transport is established
    /// - [`Error::Connection`] if the transport fails mid-read; the
    ///   error is also recorded as the session's last error
    pub async fn listen(&self) -> Result<()> {
        let mut stream = self.inner.reader_slot.lock().take().ok_or_else(|| {
            Error::protocol("read loop already running or transport not established")
        })?;

        let (quit_tx, mut quit_rx) = oneshot::channel();
        *self.inner.read_quit.lock() = Some(quit_tx);

        debug!("read loop started");
        loop {
            tokio::select! {
                biased;
                _ = &mut quit_rx => {
                    debug!("read loop stopped");
                    return Ok(());
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()).await,
                    Some(Ok(Message::Close(_))) => {
                        debug!("hub closed the connection");
                        self.connection_lost();
                        return Ok(());
                    }
                    // Binary and control frames carry nothing in this protocol.
                    Some(Ok(_)) => {}
                    Some(Err(e)) if is_normal_close(&e) => {
                        debug!("connection closed");
                        self.connection_lost();
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        let message = format!("transport read failed: {e}");
                        error!(reason = %message, "read loop terminated");
                        self.record_error(Error::connection(message.clone()));
                        self.connection_lost();
                        return Err(Error::connection(message));
                    }
                    None => {
                        debug!("transport stream ended");
                        self.connection_lost();
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Marks the session faulted after an unexpected connection loss.
    fn connection_lost(&self) {
        if self.is_closed() {
            return;
        }
        if !matches!(
            self.state(),
            SessionState::Closing
                | SessionState::Closed
                | SessionState::Dialing
                | SessionState::Faulted
        ) {
            self.set_state(SessionState::Faulted);
        }
    }
}

/// Close variants raised when a side ended the connection on purpose.
fn is_normal_close(error: &WsError) -> bool {
    matches!(error, WsError::ConnectionClosed | WsError::AlreadyClosed)
}

// ============================================================================
// Dispatch
// ============================================================================

impl Session {
    /// Classifies one inbound frame and routes it.
    async fn handle_frame(&self, raw: &str) {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        match envelope.kind {
            MessageKind::AuthRequired | MessageKind::AuthOk | MessageKind::AuthInvalid => {
                self.handle_auth(envelope.kind, raw).await;
            }
            // The hub does not interleave these before the handshake
            // completes; anything that shows up anyway is dropped.
            _ if !self.is_authenticated() => {
                debug!(kind = ?envelope.kind, "ignoring frame received before authentication");
            }
            MessageKind::Event => self.handle_event(raw),
            MessageKind::Result => self.handle_result(raw),
            MessageKind::Pong => self.handle_pong(raw),
            MessageKind::Unknown => {
                debug!(id = %envelope.id, "ignoring unrecognized message kind");
            }
        }
    }

    /// Drives the authentication handshake.
    ///
    /// The token fetch happens inline on the read loop: the hub sends
    /// nothing else until the handshake concludes, so there is nothing
    /// to starve.
    async fn handle_auth(&self, kind: MessageKind, raw: &str) {
        match kind {
            MessageKind::AuthRequired => {
                let version = serde_json::from_str::<AuthMessage>(raw)
                    .map(|m| m.ha_version)
                    .unwrap_or_default();
                debug!(%version, "hub requested authentication");

                match self.inner.config.provider.access_token().await {
                    Ok(token) => {
                        if self
                            .enqueue(OutboundFrame::Auth(AuthCommand::new(token)))
                            .await
                            .is_ok()
                        {
                            self.set_state(SessionState::Authenticating);
                        }
                    }
                    Err(e) => {
                        // Not fatal: the connection dies on its own and
                        // the next redial retries with a fresh token.
                        warn!(error = %e, "could not obtain an access token");
                        self.record_error(e);
                    }
                }
            }
            MessageKind::AuthOk => {
                if self.is_authenticated() {
                    debug!("duplicate auth_ok ignored");
                    return;
                }
                let version = serde_json::from_str::<AuthMessage>(raw)
                    .map(|m| m.ha_version)
                    .unwrap_or_default();
                info!(%version, "authenticated");
                self.set_state(SessionState::Authenticated);
            }
            MessageKind::AuthInvalid => {
                let message = serde_json::from_str::<AuthMessage>(raw)
                    .map(|m| m.message)
                    .unwrap_or_default();
                error!(reason = %message, "hub rejected the credentials");
                self.record_error(Error::auth_invalid(message));
                self.set_state(SessionState::Faulted);
                self.close().await;
            }
            _ => {}
        }
    }

    /// Routes an `event` frame: push notifications ride the same wire
    /// kind and are told apart by a non-empty body.
    fn handle_event(&self, raw: &str) {
        if let Ok(push) = serde_json::from_str::<PushNotificationMessage>(raw) {
            if push.is_notification() {
                debug!(title = %push.event.title, "push notification received");
                if let Some(channels) = self.inner.channels.lock().as_ref() {
                    let _ = channels.push_tx.send(push);
                }
                return;
            }
        }

        match serde_json::from_str::<EventMessage>(raw) {
            Ok(event) => {
                trace!(id = %event.id, event_type = %event.event.event_type, "event received");
                if let Some(channels) = self.inner.channels.lock().as_ref() {
                    let _ = channels.events_tx.send(event);
                }
            }
            Err(e) => warn!(error = %e, "dropping undecodable event frame"),
        }
    }

    /// Routes a `result` frame to its registered callback, or onto the
    /// result channel when no callback claims the id.
    fn handle_result(&self, raw: &str) {
        let result: ResultMessage = match serde_json::from_str(raw) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "dropping undecodable result frame");
                return;
            }
        };

        if let Some(callback) = self.inner.registry.take(result.id) {
            trace!(id = %result.id, success = result.success, "result dispatched to callback");
            callback(result);
        } else if let Some(channels) = self.inner.channels.lock().as_ref() {
            let _ = channels.results_tx.send(result);
        }
    }

    fn handle_pong(&self, raw: &str) {
        match serde_json::from_str::<PongMessage>(raw) {
            Ok(pong) => {
                trace!(id = %pong.id, "pong received");
                if let Some(channels) = self.inner.channels.lock().as_ref() {
                    let _ = channels.pongs_tx.send(pong);
                }
            }
            Err(e) => warn!(error = %e, "dropping undecodable pong frame"),
        }
    }
}

// ============================================================================
// Sending
// ============================================================================

impl Session {
    /// Sends a numbered command.
    ///
    /// The returned sequence id is unique for the lifetime of the
    /// session; ids keep increasing across redials. Subscription-class
    /// commands are remembered and replayed by
    /// [`resubscribe`](Session::resubscribe).
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthenticated`] while the handshake is incomplete
    ///   or after the connection is lost
    /// - [`Error::SessionClosed`] once the session is closed
    pub async fn send_command(&self, command: Command) -> Result<SequenceId> {
        self.send_command_inner(command, true).await
    }

    /// Sends a numbered command and registers a one-shot callback for
    /// its result.
    ///
    /// The callback is registered before the command is enqueued, so
    /// even an immediate reply finds it. It runs on the read loop; keep
    /// it cheap and hand heavy work to a task. A callback left behind by
    /// a lost connection is never invoked.
    ///
    /// # Errors
    ///
    /// Same conditions as [`send_command`](Session::send_command); on
    /// failure the callback is unregistered and dropped.
    pub async fn send_command_with_callback<F>(
        &self,
        command: Command,
        callback: F,
    ) -> Result<SequenceId>
    where
        F: FnOnce(ResultMessage) + Send + 'static,
    {
        self.ensure_authenticated()?;
        self.record_subscription(&command);

        let id = self.inner.registry.next_id();
        self.inner.registry.register(id, Box::new(callback));

        if let Err(e) = self
            .enqueue(OutboundFrame::Command(CommandFrame::new(id, command)))
            .await
        {
            self.inner.registry.take(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Replays every standing subscription with fresh sequence ids.
    ///
    /// Called after a redial completes and the session is authenticated
    /// again. Replayed commands are not re-recorded, so the standing
    /// list does not grow. Returns the number of replayed subscriptions.
    ///
    /// # Errors
    ///
    /// Returns the first send failure; remaining subscriptions are left
    /// for the next attempt.
    pub async fn resubscribe(&self) -> Result<usize> {
        let standing: Vec<Command> = self.inner.subscriptions.lock().clone();
        let count = standing.len();
        for command in standing {
            let id = self.send_command_inner(command, false).await?;
            debug!(%id, "subscription replayed");
        }
        if count > 0 {
            info!(count, "standing subscriptions replayed");
        }
        Ok(count)
    }

    async fn send_command_inner(&self, command: Command, record: bool) -> Result<SequenceId> {
        self.ensure_authenticated()?;
        if record {
            self.record_subscription(&command);
        }
        let id = self.inner.registry.next_id();
        self.enqueue(OutboundFrame::Command(CommandFrame::new(id, command)))
            .await?;
        Ok(id)
    }

    async fn enqueue(&self, frame: OutboundFrame) -> Result<()> {
        self.inner
            .outbox_tx
            .send(frame)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        if !self.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        Ok(())
    }

    fn record_subscription(&self, command: &Command) {
        if command.is_subscription() {
            self.inner.subscriptions.lock().push(command.clone());
        }
    }
}

// ============================================================================
// Channels
// ============================================================================

impl Session {
    /// Subscribes to event deliveries.
    ///
    /// Every subscriber sees every event. A subscriber that falls more
    /// than the channel capacity behind loses the oldest deliveries and
    /// observes the gap as a lag error on `recv`. After the session
    /// closes, `recv` reports the channel as closed.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<EventMessage> {
        match self.inner.channels.lock().as_ref() {
            Some(channels) => channels.events_tx.subscribe(),
            None => closed_receiver(),
        }
    }

    /// Subscribes to push notifications.
    #[must_use]
    pub fn push_notifications(&self) -> broadcast::Receiver<PushNotificationMessage> {
        match self.inner.channels.lock().as_ref() {
            Some(channels) => channels.push_tx.subscribe(),
            None => closed_receiver(),
        }
    }

    /// Subscribes to command results that no callback claimed.
    #[must_use]
    pub fn results(&self) -> broadcast::Receiver<ResultMessage> {
        match self.inner.channels.lock().as_ref() {
            Some(channels) => channels.results_tx.subscribe(),
            None => closed_receiver(),
        }
    }

    /// Subscribes to heartbeat replies.
    #[must_use]
    pub fn pongs(&self) -> broadcast::Receiver<PongMessage> {
        match self.inner.channels.lock().as_ref() {
            Some(channels) => channels.pongs_tx.subscribe(),
            None => closed_receiver(),
        }
    }

    /// Subscribes to heartbeat timeout verdicts.
    ///
    /// The monitor posts exactly one verdict per detected timeout; see
    /// [`monitor_connection`](Session::monitor_connection).
    #[must_use]
    pub fn pong_timeouts(&self) -> broadcast::Receiver<()> {
        match self.inner.channels.lock().as_ref() {
            Some(channels) => channels.pong_timeouts_tx.subscribe(),
            None => closed_receiver(),
        }
    }
}

/// A receiver whose channel is already closed, handed out after the
/// session has shut its channels down.
fn closed_receiver<T: Clone>() -> broadcast::Receiver<T> {
    broadcast::channel(1).1
}

// ============================================================================
// Lifecycle
// ============================================================================

impl Session {
    /// Waits until the handshake completes.
    ///
    /// Resolves immediately when the session is already authenticated,
    /// and again after every successful redial once the new transport
    /// authenticates.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthInvalid`] if the hub rejected the credentials
    /// - [`Error::Connection`] if the session faulted first
    /// - [`Error::SessionClosed`] if the session closed first
    pub async fn ready(&self) -> Result<()> {
        let mut state_rx = self.inner.state_tx.subscribe();
        let state = state_rx
            .wait_for(|state| {
                matches!(
                    state,
                    SessionState::Authenticated
                        | SessionState::Faulted
                        | SessionState::Closing
                        | SessionState::Closed
                )
            })
            .await
            .map_err(|_| Error::SessionClosed)?;

        match *state {
            SessionState::Authenticated => Ok(()),
            SessionState::Faulted => match self.last_error() {
                Some(error) => match error.as_ref() {
                    Error::AuthInvalid { message } => Err(Error::auth_invalid(message.clone())),
                    _ => Err(Error::connection(format!("session faulted: {error}"))),
                },
                None => Err(Error::connection("session faulted before authentication")),
            },
            _ => Err(Error::SessionClosed),
        }
    }

    /// Replaces the transport underneath the session.
    ///
    /// The read loop and writer of the old connection are stopped, a
    /// fresh connection is dialed and the session returns to
    /// `AuthRequired`; spawn [`listen`](Session::listen) again to drive
    /// the new handshake. Sequence ids, subscriber channels, callbacks
    /// and standing subscriptions are untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the session is closed
    /// - [`Error::Connection`] / [`Error::ConnectionTimeout`] if the
    ///   dial fails; the session stays `Faulted` and redial may be
    ///   called again
    pub async fn redial(&self) -> Result<()> {
        info!("redialing hub");
        self.establish().await
    }

    /// Closes the session and all its channels.
    ///
    /// Idempotent: the first call performs the teardown, every later
    /// call returns immediately. Stops the monitor, the read loop and
    /// the writer, then drops the fan-out senders exactly once.
    pub async fn close(&self) {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("close called on an already-closed session");
            return;
        }

        info!("closing session");
        self.set_state(SessionState::Closing);
        self.stop_monitor();

        if let Some(quit) = self.inner.read_quit.lock().take() {
            let _ = quit.send(());
        }

        let writer = self.inner.writer_slot.lock().take();
        if let Some(writer) = writer {
            match writer.stop().await {
                Ok(outbox) => drop(outbox),
                Err(e) => warn!(error = %e, "write loop did not stop cleanly"),
            }
        }

        self.inner.outbox_slot.lock().take();
        self.inner.reader_slot.lock().take();

        // Dropping the senders is what closes the subscriber channels;
        // the flag above makes sure it happens exactly once.
        self.inner.channels.lock().take();

        self.set_state(SessionState::Closed);
        info!("session closed");
    }

    /// Stops the heartbeat monitor if one is running.
    pub fn stop_monitor(&self) {
        if let Some(quit) = self.inner.monitor_quit.lock().take() {
            let _ = quit.send(());
        }
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Session {
    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state_tx.borrow()
    }

    /// Watches lifecycle transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether the handshake has completed on the current transport.
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Whether [`close`](Session::close) has been called.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The most recent recorded failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.inner.last_error.lock().clone()
    }

    /// Number of callbacks still waiting for a result.
    #[inline]
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.inner.registry.pending()
    }

    /// The configured hub base URL.
    #[inline]
    #[must_use]
    pub fn server(&self) -> &Url {
        &self.inner.config.server
    }
}

// ============================================================================
// Internal
// ============================================================================

impl Session {
    pub(crate) fn record_error(&self, error: Error) {
        *self.inner.last_error.lock() = Some(Arc::new(error));
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.inner.state_tx.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "session state changed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
