//! Heartbeat monitoring.
//!
//! Every ping interval the monitor sends a `ping` through the regular
//! command path and expects the matching `pong` within the pong
//! deadline. A missed deadline stops the monitor and posts exactly one
//! verdict on the pong-timeout channel; acting on it (usually
//! redialing) is left to the owner, normally the
//! [`Supervisor`](super::Supervisor). A stopped monitor stays stopped
//! until spawned again.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::{broadcast, oneshot};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::identifiers::SequenceId;
use crate::protocol::{Command, PongMessage};

use super::core::Session;

// ============================================================================
// Monitor Loop
// ============================================================================

impl Session {
    /// Runs the heartbeat loop until stopped or the probe path fails.
    ///
    /// Spawn once the session is ready; probes ride the normal command
    /// path, so a session that loses authentication stops the monitor
    /// at the next probe. Each probe gets its own watcher task that
    /// waits for the matching pong; the first missed deadline records a
    /// [`Error::PongTimeout`], posts one verdict on
    /// [`pong_timeouts`](Session::pong_timeouts) and stops the loop.
    ///
    /// ```ignore
    /// let monitor = session.clone();
    /// tokio::spawn(async move { monitor.monitor_connection().await });
    /// ```
    pub async fn monitor_connection(&self) {
        let (quit_tx, mut quit_rx) = oneshot::channel();
        *self.inner.monitor_quit.lock() = Some(quit_tx);

        let mut ticker = interval(self.inner.config.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the first probe belongs one
        // full interval out.
        ticker.tick().await;

        debug!(
            interval_ms = self.inner.config.ping_interval.as_millis() as u64,
            "heartbeat monitor started"
        );
        loop {
            tokio::select! {
                _ = &mut quit_rx => {
                    debug!("heartbeat monitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    // Subscribe before the probe is on the wire so the
                    // reply cannot slip past the watcher.
                    let pongs = self.pongs();
                    let id = match self.send_command(Command::ping()).await {
                        Ok(id) => id,
                        Err(e) => {
                            warn!(error = %e, "failed to send ping; stopping monitor");
                            self.inner.monitor_quit.lock().take();
                            return;
                        }
                    };
                    trace!(%id, "ping sent");

                    let session = self.clone();
                    tokio::spawn(watch_for_pong(session, pongs, id));
                }
            }
        }
    }
}

/// Ephemeral watcher for one probe: a pong missing past the deadline
/// stops the monitor and posts the timeout verdict.
async fn watch_for_pong(session: Session, mut pongs: broadcast::Receiver<PongMessage>, id: SequenceId) {
    let deadline = session.inner.config.pong_deadline;
    let wait = timeout(deadline, async {
        loop {
            match pongs.recv().await {
                Ok(pong) if pong.id == id => return true,
                // A straggling reply to an earlier probe.
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await;

    match wait {
        Ok(true) => trace!(%id, "pong received"),
        // Channels gone: the session is tearing down, not timing out.
        Ok(false) => {}
        Err(_) => {
            warn!(
                %id,
                deadline_ms = deadline.as_millis() as u64,
                "no pong within deadline"
            );
            session.record_error(Error::PongTimeout);
            session.stop_monitor();
            if let Some(channels) = session.inner.channels.lock().as_ref() {
                let _ = channels.pong_timeouts_tx.send(());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
