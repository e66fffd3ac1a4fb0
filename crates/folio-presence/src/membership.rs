//! Join/leave for the local reader and the liveness heartbeat.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use folio_common::{PresenceError, RoomId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::RoomApi;
use crate::presence::PresenceChannelCoordinator;
use crate::roster::{ConnectionMode, PresenceState, RosterSnapshot};

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub heartbeat_interval: Duration,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// The local reader's occupancy of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    pub room_id: RoomId,
    pub joined_at: DateTime<Utc>,
}

/// Join/leave semantics for the local reader.
///
/// Owns the heartbeat timer and the presence coordinator of the joined
/// room. Dropping the controller tears both down.
pub struct RoomMembershipController {
    api: Arc<dyn RoomApi>,
    coordinator: PresenceChannelCoordinator,
    config: MembershipConfig,
    membership: Option<RoomMembership>,
    heartbeat: Option<JoinHandle<()>>,
    joined_tx: watch::Sender<bool>,
}

impl RoomMembershipController {
    pub fn new(
        api: Arc<dyn RoomApi>,
        coordinator: PresenceChannelCoordinator,
        config: MembershipConfig,
    ) -> Self {
        let (joined_tx, _) = watch::channel(false);
        Self {
            api,
            coordinator,
            config,
            membership: None,
            heartbeat: None,
            joined_tx,
        }
    }

    /// Join `room_id`. Errors are returned as-is and never retried.
    pub async fn join(&mut self, room_id: RoomId) -> Result<(), PresenceError> {
        if let Err(e) = self.api.join_room(&room_id).await {
            warn!(room_id = %room_id, error = %e, "Join rejected");
            return Err(e);
        }

        let previous = self
            .membership
            .as_ref()
            .map(|m| m.room_id.clone())
            .filter(|previous| *previous != room_id);
        if let Some(previous) = previous {
            debug!(from = %previous, to = %room_id, "Switching rooms");
            if let Err(e) = self.api.leave_room(&previous).await {
                debug!(room_id = %previous, error = %e, "Leaving previous room failed, ignoring");
            }
        }

        self.membership = Some(RoomMembership {
            room_id: room_id.clone(),
            joined_at: Utc::now(),
        });
        self.joined_tx.send_replace(true);
        self.coordinator.enable(room_id.clone());
        self.arm_heartbeat(room_id.clone());
        info!(room_id = %room_id, "Joined room");
        Ok(())
    }

    /// Leave `room_id`. On failure the reader stays joined and the error
    /// is returned.
    pub async fn leave(&mut self, room_id: &RoomId) -> Result<(), PresenceError> {
        if let Err(e) = self.api.leave_room(room_id).await {
            warn!(room_id = %room_id, error = %e, "Leave failed");
            return Err(e);
        }
        if self.joined_room() == Some(room_id) {
            self.release();
            info!(room_id = %room_id, "Left room");
        }
        Ok(())
    }

    /// Component teardown: stop the heartbeat and the transport without
    /// waiting on any RPC. Idempotent.
    pub fn teardown(&mut self) {
        if self.membership.is_some() || self.heartbeat.is_some() {
            self.release();
            debug!("Membership torn down");
        }
    }

    fn release(&mut self) {
        self.stop_heartbeat();
        self.coordinator.disable();
        self.membership = None;
        self.joined_tx.send_replace(false);
    }

    fn arm_heartbeat(&mut self, room_id: RoomId) {
        self.stop_heartbeat();

        let api = Arc::clone(&self.api);
        let period = self.config.heartbeat_interval;
        let first = Instant::now() + period;
        self.heartbeat = Some(tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match api.heartbeat(&room_id).await {
                    Ok(()) => debug!(room_id = %room_id, "Heartbeat sent"),
                    Err(e) => debug!(room_id = %room_id, error = %e, "Heartbeat failed, ignoring"),
                }
            }
        }));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }

    pub fn is_joined(&self) -> bool {
        self.membership.is_some()
    }

    pub fn membership(&self) -> Option<&RoomMembership> {
        self.membership.as_ref()
    }

    pub fn joined_room(&self) -> Option<&RoomId> {
        self.membership.as_ref().map(|m| &m.room_id)
    }

    pub fn heartbeat_armed(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn subscribe_joined(&self) -> watch::Receiver<bool> {
        self.joined_tx.subscribe()
    }

    pub fn subscribe(&self) -> watch::Receiver<PresenceState> {
        self.coordinator.subscribe()
    }

    pub fn roster(&self) -> RosterSnapshot {
        self.coordinator.state().roster
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.coordinator.connection_mode()
    }

    pub fn presence_enabled(&self) -> bool {
        self.coordinator.is_enabled()
    }

    /// Nobody else is reading along.
    pub fn is_sole_occupant(&self) -> bool {
        self.roster().len() <= 1
    }

    /// Whether an occupant detail view has anything to show.
    pub fn can_list_occupants(&self) -> bool {
        !self.roster().is_empty()
    }
}

impl Drop for RoomMembershipController {
    fn drop(&mut self) {
        self.teardown();
    }
}
