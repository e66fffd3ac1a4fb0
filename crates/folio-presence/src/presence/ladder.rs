//! Background task walking the realtime → polling → offline ladder.

use std::sync::Arc;

use folio_common::RoomId;
use tokio::sync::watch;
use tokio::time::{interval, interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::api::{PresenceProvider, RoomApi};
use crate::roster::{ConnectionMode, PresenceState, RosterDelta};

use super::session::{SessionUpdate, TransportSession};
use super::types::CoordinatorConfig;

/// Owns the transports for one enabled room. Dropped (together with any
/// open session) when the coordinator disables the room.
pub(crate) struct Ladder {
    pub(crate) room_id: RoomId,
    pub(crate) provider: Arc<dyn PresenceProvider>,
    pub(crate) rooms: Arc<dyn RoomApi>,
    pub(crate) config: CoordinatorConfig,
    pub(crate) state_tx: watch::Sender<PresenceState>,
    pub(crate) cancel: CancellationToken,
}

impl Ladder {
    pub(crate) async fn run(self) {
        let mut session = self.try_push().await;
        loop {
            if let Some(active) = session.take() {
                self.drive_push(active).await;
            }
            session = Some(self.drive_polling().await);
        }
    }

    /// Commit a state change unless the room was disabled meanwhile. The
    /// check runs under the watch lock, so a disable that already reset the
    /// state can never be overwritten by this task.
    fn publish(&self, update: impl FnOnce(&mut PresenceState)) {
        let cancel = &self.cancel;
        self.state_tx.send_if_modified(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            let before = state.clone();
            update(state);
            *state != before
        });
    }

    fn set_mode(&self, mode: ConnectionMode) {
        self.publish(|state| state.mode = mode);
    }

    async fn try_push(&self) -> Option<TransportSession> {
        let seed = self.state_tx.borrow().roster.clone();
        let attempt = TransportSession::open(self.provider.as_ref(), self.room_id.clone(), seed);
        match timeout(self.config.connect_timeout, attempt).await {
            Ok(Ok(session)) => Some(session),
            Ok(Err(e)) => {
                debug!(room_id = %self.room_id, error = %e, "Push transport unavailable");
                None
            }
            Err(_elapsed) => {
                warn!(
                    room_id = %self.room_id,
                    timeout_secs = self.config.connect_timeout.as_secs(),
                    "Push transport connect timed out"
                );
                None
            }
        }
    }

    async fn drive_push(&self, mut session: TransportSession) {
        self.set_mode(ConnectionMode::Realtime);
        info!(room_id = %self.room_id, "Presence feed is realtime");

        loop {
            match timeout(self.config.liveness_timeout, session.next_update()).await {
                Ok(SessionUpdate::Roster(roster)) => {
                    trace!(room_id = %self.room_id, members = roster.len(), "Roster delta");
                    self.publish(|state| state.roster = roster);
                }
                Ok(SessionUpdate::KeepAlive) => {}
                Ok(SessionUpdate::Lost(reason)) => {
                    warn!(room_id = %self.room_id, reason = %reason, "Push transport lost, falling back to polling");
                    break;
                }
                Err(_elapsed) => {
                    warn!(
                        room_id = %self.room_id,
                        timeout_secs = self.config.liveness_timeout.as_secs(),
                        "Push transport went silent, falling back to polling"
                    );
                    break;
                }
            }
        }

        session.close();
    }

    /// Poll the roster until an upgrade probe yields a push session.
    ///
    /// Probes only run while polling succeeds; an offline room has to
    /// recover through a successful poll before it may go realtime again.
    async fn drive_polling(&self) -> TransportSession {
        let mut mode = ConnectionMode::Polling;
        let mut failures: u32 = 0;
        self.set_mode(mode);

        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let probe_every = self.config.upgrade_probe_interval;
        let mut probe = interval_at(Instant::now() + probe_every, probe_every);
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    match self.rooms.roster_poll(&self.room_id).await {
                        Ok(members) => {
                            failures = 0;
                            if mode == ConnectionMode::Offline {
                                info!(room_id = %self.room_id, "Roster poll recovered");
                            }
                            mode = ConnectionMode::Polling;
                            self.publish(|state| {
                                state.roster = state.roster.apply(&RosterDelta::Reset(members));
                                state.mode = ConnectionMode::Polling;
                            });
                        }
                        Err(e) => {
                            failures += 1;
                            debug!(room_id = %self.room_id, failures, error = %e, "Roster poll failed");
                            // Retrying soon cannot fix a rejected poll.
                            let exhausted = failures >= self.config.max_poll_failures || !e.is_transient();
                            if exhausted && mode != ConnectionMode::Offline {
                                mode = ConnectionMode::Offline;
                                warn!(room_id = %self.room_id, failures, error = %e, "Presence offline, keeping last known roster");
                                self.set_mode(mode);
                            }
                        }
                    }
                }
                _ = probe.tick() => {
                    if mode != ConnectionMode::Polling {
                        continue;
                    }
                    if let Some(session) = self.try_push().await {
                        info!(room_id = %self.room_id, "Upgrade probe succeeded, leaving polling");
                        return session;
                    }
                }
            }
        }
    }
}
