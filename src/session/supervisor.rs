//! Keeps a [`Session`] alive across connection failures.
//!
//! [`Supervisor::run`] owns the read loop and the heartbeat monitor for a
//! session and restarts them after every disconnect. Callers that hand a
//! session to a supervisor must not call [`Session::listen`] or
//! [`Session::monitor_connection`] themselves.

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::session::Session;

// ============================================================================
// Supervisor
// ============================================================================

/// Drives a [`Session`] until it is closed or its credentials are rejected.
///
/// Each pass of the supervision loop spawns the read loop, waits for
/// authentication, replays standing subscriptions, and runs the heartbeat
/// monitor until either the connection drops or a probe goes unanswered.
/// It then redials and starts over. Subscribers and pending callbacks on the
/// session survive every pass because the session itself is never replaced.
///
/// # Example
///
/// ```no_run
/// # use hass_companion::{LongLivedToken, Session, Supervisor};
/// # async fn demo() -> hass_companion::Result<()> {
/// let session = Session::builder()
///     .server("http://homeassistant.local:8123")
///     .credentials(LongLivedToken::new("token"))
///     .connect()
///     .await?;
///
/// let supervisor = tokio::spawn(Supervisor::new(session.clone()).run());
///
/// session.ready().await?;
/// // ... use the session ...
/// session.close().await;
///
/// supervisor.await.ok();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Supervisor {
    session: Session,
}

impl Supervisor {
    /// Creates a supervisor for `session`.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// The supervised session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs the supervision loop until the session ends.
    ///
    /// Returns `Ok(())` once the session has been closed with
    /// [`Session::close`], and [`Error::AuthInvalid`] if the hub rejects the
    /// credentials, since retrying the same token would never succeed. Every
    /// other failure is handled by redialing: the first attempt happens
    /// immediately and later attempts are spaced by the builder's reconnect
    /// backoff.
    pub async fn run(self) -> Result<()> {
        info!(server = %self.session.server(), "supervisor started");

        loop {
            let mut listen_task = self.spawn_listen();

            let ready = self.session.ready();
            match timeout(self.session.inner.config.ready_timeout, ready).await {
                Ok(Ok(())) => match self.session.resubscribe().await {
                    Ok(_) => {
                        // Subscribe before the monitor starts so the first
                        // verdict cannot slip past us.
                        let mut verdicts = self.session.pong_timeouts();
                        let _monitor = self.spawn_monitor();

                        tokio::select! {
                            outcome = &mut listen_task => match outcome {
                                Ok(Ok(())) => debug!("read loop exited"),
                                Ok(Err(error)) => warn!(%error, "read loop failed"),
                                Err(error) => warn!(%error, "read loop task failed"),
                            },
                            verdict = verdicts.recv() => match verdict {
                                Ok(()) => warn!("heartbeat timed out"),
                                Err(_) => debug!("verdict channel closed"),
                            },
                        }

                        self.session.stop_monitor();
                    }
                    Err(error) => {
                        warn!(%error, "could not replay subscriptions");
                    }
                },
                Ok(Err(error)) => {
                    warn!(%error, "connection did not become ready");
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.session.inner.config.ready_timeout.as_millis() as u64,
                        "authentication did not complete in time"
                    );
                }
            }

            // Rejected credentials close the session, so check them first.
            if let Some(error) = self.auth_fault() {
                error!(%error, "credentials rejected, supervisor giving up");
                return Err(error);
            }
            if self.session.is_closed() {
                info!("session closed, supervisor finished");
                return Ok(());
            }

            if self.redial_until_connected().await.is_err() {
                info!("session closed, supervisor finished");
                return Ok(());
            }
        }
    }

    fn spawn_listen(&self) -> JoinHandle<Result<()>> {
        let session = self.session.clone();
        tokio::spawn(async move { session.listen().await })
    }

    fn spawn_monitor(&self) -> JoinHandle<()> {
        let session = self.session.clone();
        tokio::spawn(async move { session.monitor_connection().await })
    }

    /// Redials until a connection is established, sleeping the configured
    /// backoff between failed attempts. Fails only when the session is
    /// closed while reconnecting.
    async fn redial_until_connected(&self) -> Result<()> {
        let backoff = self.session.inner.config.reconnect_backoff;
        let mut attempt: u32 = 1;

        loop {
            match self.session.redial().await {
                Ok(()) => {
                    info!(attempt, "reconnected");
                    return Ok(());
                }
                Err(Error::SessionClosed) => return Err(Error::SessionClosed),
                Err(error) => {
                    warn!(
                        attempt,
                        %error,
                        backoff_ms = backoff.as_millis() as u64,
                        "redial failed"
                    );
                    attempt += 1;
                    sleep(backoff).await;
                }
            }
        }
    }

    /// The recorded credential rejection, if the last pass ended with one.
    fn auth_fault(&self) -> Option<Error> {
        let error = self.session.last_error()?;
        match error.as_ref() {
            Error::AuthInvalid { message } => Some(Error::auth_invalid(message.clone())),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::auth::LongLivedToken;
    use crate::protocol::Command;
    use crate::session::mock_hub::{HubConnection, MockHub, init_tracing};

    const TOKEN: &str = "test-token";

    async fn connect_supervised(hub: &MockHub) -> (Session, HubConnection) {
        let connect = Session::builder()
            .server(hub.url().as_str())
            .credentials(LongLivedToken::new(TOKEN))
            .ping_interval(Duration::from_millis(200))
            .pong_deadline(Duration::from_millis(100))
            .reconnect_backoff(Duration::from_millis(50))
            .ready_timeout(Duration::from_secs(5))
            .connect();
        let (session, conn) = tokio::join!(connect, hub.accept());
        (session.expect("connect"), conn)
    }

    #[tokio::test]
    async fn test_supervisor_redials_and_replays_subscriptions() -> anyhow::Result<()> {
        init_tracing();
        let hub = MockHub::bind().await;
        let (session, mut conn) = connect_supervised(&hub).await;
        let supervisor = tokio::spawn(Supervisor::new(session.clone()).run());

        conn.authenticate(TOKEN).await;
        session.ready().await?;

        session
            .send_command(Command::subscribe_events("state_changed"))
            .await?;
        let subscribe = conn.recv_command().await.expect("subscribe frame");
        assert_eq!(subscribe["type"], "subscribe_events");
        let first_id = subscribe["id"].as_i64().expect("id");

        // Kill the connection without a close frame.
        conn.abort();

        // The supervisor redials, re-authenticates, and replays the
        // subscription under a fresh id.
        let mut conn = hub.accept().await;
        conn.authenticate(TOKEN).await;
        let replay = conn.recv_command().await.expect("replayed subscribe");
        assert_eq!(replay["type"], "subscribe_events");
        assert_eq!(replay["event_type"], "state_changed");
        assert!(replay["id"].as_i64().expect("id") > first_id);

        // The heartbeat monitor is back as well: answer one probe.
        let ping = conn.recv_json().await.expect("ping frame");
        assert_eq!(ping["type"], "ping");
        let id = ping["id"].as_i64().expect("ping id");
        conn.send(&format!(r#"{{"id": {id}, "type": "pong"}}"#)).await;

        session.close().await;
        timeout(Duration::from_secs(5), supervisor).await??.map_err(anyhow::Error::from)
    }

    #[tokio::test]
    async fn test_supervisor_stops_on_rejected_credentials() {
        init_tracing();
        let hub = MockHub::bind().await;
        let (session, mut conn) = connect_supervised(&hub).await;
        let supervisor = tokio::spawn(Supervisor::new(session.clone()).run());

        conn.send(r#"{"type": "auth_required", "ha_version": "2024.1.0"}"#)
            .await;
        let auth = conn.recv_json().await.expect("auth frame");
        assert_eq!(auth["type"], "auth");
        conn.send(r#"{"type": "auth_invalid", "message": "Invalid access token"}"#)
            .await;

        let outcome = timeout(Duration::from_secs(5), supervisor)
            .await
            .expect("supervisor finishes")
            .expect("supervisor task");
        let error = outcome.expect_err("rejected credentials stop the supervisor");
        assert!(error.is_auth_error());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_supervisor_recovers_from_heartbeat_timeout() -> anyhow::Result<()> {
        init_tracing();
        let hub = MockHub::bind().await;
        let (session, mut conn) = connect_supervised(&hub).await;
        let supervisor = tokio::spawn(Supervisor::new(session.clone()).run());

        conn.authenticate(TOKEN).await;
        session.ready().await?;

        // Swallow every probe so the pong deadline lapses while the
        // connection itself stays open.
        let mute = tokio::spawn(async move { while conn.recv_json().await.is_some() {} });

        // The missed pong makes the supervisor tear down and redial.
        let mut conn = hub.accept().await;
        conn.authenticate(TOKEN).await;
        session.ready().await?;
        assert!(session.is_authenticated());
        mute.await?;

        session.close().await;
        timeout(Duration::from_secs(5), supervisor).await??.map_err(anyhow::Error::from)
    }
}
