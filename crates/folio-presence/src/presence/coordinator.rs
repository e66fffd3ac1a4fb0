//! Public handle that enables/disables presence tracking for one room.

use std::sync::Arc;

use folio_common::RoomId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{PresenceProvider, RoomApi};
use crate::roster::{ConnectionMode, PresenceState};

use super::ladder::Ladder;
use super::types::CoordinatorConfig;

struct ActiveRoom {
    room_id: RoomId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Produces a continuously updated roster and connection mode for the
/// enabled room, degrading from push to polling to offline as needed.
///
/// At most one room is live at a time; enabling another room tears the
/// previous one down first.
pub struct PresenceChannelCoordinator {
    provider: Arc<dyn PresenceProvider>,
    rooms: Arc<dyn RoomApi>,
    config: CoordinatorConfig,
    state_tx: watch::Sender<PresenceState>,
    active: Option<ActiveRoom>,
}

impl PresenceChannelCoordinator {
    pub fn new(
        provider: Arc<dyn PresenceProvider>,
        rooms: Arc<dyn RoomApi>,
        config: CoordinatorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(PresenceState::default());
        Self {
            provider,
            rooms,
            config,
            state_tx,
            active: None,
        }
    }

    /// Start tracking `room_id`. A no-op if that room is already enabled.
    pub fn enable(&mut self, room_id: RoomId) {
        if let Some(active) = &self.active {
            if active.room_id == room_id {
                debug!(room_id = %room_id, "Presence already enabled");
                return;
            }
            self.disable();
        }

        self.state_tx.send_replace(PresenceState {
            room_id: Some(room_id.clone()),
            mode: ConnectionMode::Realtime,
            ..PresenceState::default()
        });

        let cancel = CancellationToken::new();
        let ladder = Ladder {
            room_id: room_id.clone(),
            provider: Arc::clone(&self.provider),
            rooms: Arc::clone(&self.rooms),
            config: self.config.clone(),
            state_tx: self.state_tx.clone(),
            cancel: cancel.clone(),
        };
        let guard = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = ladder.run() => {}
            }
        });

        info!(room_id = %room_id, "Presence enabled");
        self.active = Some(ActiveRoom {
            room_id,
            cancel,
            task,
        });
    }

    /// Tear down whichever transport is active. Safe to call repeatedly.
    pub fn disable(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();
        active.task.abort();
        self.state_tx.send_replace(PresenceState::default());
        info!(room_id = %active.room_id, "Presence disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.active.as_ref().map(|a| &a.room_id)
    }

    pub fn state(&self) -> PresenceState {
        self.state_tx.borrow().clone()
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.state_tx.borrow().mode
    }

    pub fn subscribe(&self) -> watch::Receiver<PresenceState> {
        self.state_tx.subscribe()
    }
}

impl Drop for PresenceChannelCoordinator {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use folio_common::PresenceError;

    use super::*;
    use crate::api::ProviderEvent;
    use crate::roster::{PresenceMember, RosterDelta};
    use crate::test_support::{settle, FakeProvider, FakeRoomApi};

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            connect_timeout: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            max_poll_failures: 3,
            upgrade_probe_interval: Duration::from_secs(30),
        }
    }

    fn coordinator(
        provider: &Arc<FakeProvider>,
        rooms: &Arc<FakeRoomApi>,
    ) -> PresenceChannelCoordinator {
        PresenceChannelCoordinator::new(provider.clone(), rooms.clone(), config())
    }

    /// Every distinct mode a subscriber observes, in order.
    fn record_modes(mut rx: watch::Receiver<PresenceState>) -> Arc<Mutex<Vec<ConnectionMode>>> {
        let seen = Arc::new(Mutex::new(vec![rx.borrow_and_update().mode]));
        let sink = Arc::clone(&seen);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let mode = rx.borrow_and_update().mode;
                let mut seen = sink.lock().unwrap();
                if seen.last() != Some(&mode) {
                    seen.push(mode);
                }
            }
        });
        seen
    }

    fn upsert(member: PresenceMember) -> ProviderEvent {
        ProviderEvent::Delta(RosterDelta::Upsert(member))
    }

    #[tokio::test(start_paused = true)]
    async fn push_success_is_realtime_and_merges_deltas() {
        let provider = FakeProvider::reachable();
        let rooms = FakeRoomApi::new();
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);

        provider.emit(upsert(PresenceMember::reader("a", "Ada"))).await;
        provider.emit(upsert(PresenceMember::reader("b", "Ben"))).await;
        provider.emit(upsert(PresenceMember::reader("a", "Ada L."))).await;
        provider
            .emit(ProviderEvent::Delta(RosterDelta::Remove("b".into())))
            .await;
        settle().await;

        let state = coord.state();
        assert_eq!(state.room_id, Some(RoomId::new("book-1")));
        assert_eq!(state.roster.len(), 1);
        assert_eq!(state.roster.get("a").unwrap().display_name, "Ada L.");
        assert_eq!(rooms.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_enable_never_shows_offline() {
        let provider = FakeProvider::reachable();
        let rooms = FakeRoomApi::new();
        let mut coord = coordinator(&provider, &rooms);
        let seen = record_modes(coord.subscribe());

        coord.enable(RoomId::new("book-1"));
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);
        settle().await;
        coord.disable();
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![ConnectionMode::Realtime]);
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_is_reached_only_through_failed_polls() {
        let provider = FakeProvider::unreachable();
        let rooms = FakeRoomApi::new();
        rooms.fail_polls(true);
        let mut coord = coordinator(&provider, &rooms);
        let seen = record_modes(coord.subscribe());

        coord.enable(RoomId::new("book-1"));
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Polling);

        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(10)).await;
            settle().await;
        }
        assert_eq!(coord.connection_mode(), ConnectionMode::Offline);
        assert_eq!(rooms.poll_calls(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ConnectionMode::Realtime,
                ConnectionMode::Polling,
                ConnectionMode::Offline
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn push_failure_falls_back_to_polling() {
        let provider = FakeProvider::unreachable();
        let rooms = FakeRoomApi::new();
        rooms.set_roster(vec![PresenceMember::reader("a", "Ada")]);
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;

        assert_eq!(coord.connection_mode(), ConnectionMode::Polling);
        assert_eq!(coord.state().roster.len(), 1);
        assert_eq!(rooms.poll_calls(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(rooms.poll_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_push_feed_falls_back_to_polling_with_roster_kept() {
        let provider = FakeProvider::reachable();
        let rooms = FakeRoomApi::new();
        rooms.fail_polls(true);
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        provider.emit(upsert(PresenceMember::reader("a", "Ada"))).await;
        settle().await;

        provider.set_reachable(false);
        provider.emit(ProviderEvent::Lost("socket closed".into())).await;
        settle().await;

        assert_eq!(coord.connection_mode(), ConnectionMode::Polling);
        assert!(provider.latest_feed_closed());
        assert_eq!(coord.state().roster.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_push_feed_times_out_into_polling() {
        let provider = FakeProvider::reachable();
        let rooms = FakeRoomApi::new();
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        provider.set_reachable(false);

        tokio::time::advance(Duration::from_secs(30)).await;
        provider.emit(ProviderEvent::KeepAlive).await;
        settle().await;
        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Polling);
        assert!(rooms.poll_calls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_poll_failures_go_offline_keeping_last_roster() {
        let provider = FakeProvider::unreachable();
        let rooms = FakeRoomApi::new();
        rooms.set_roster(vec![
            PresenceMember::reader("a", "Ada"),
            PresenceMember::reader("b", "Ben"),
        ]);
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        assert_eq!(coord.state().roster.len(), 2);

        rooms.fail_polls(true);
        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(10)).await;
            settle().await;
            assert_eq!(coord.connection_mode(), ConnectionMode::Polling);
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        let state = coord.state();
        assert_eq!(state.mode, ConnectionMode::Offline);
        assert_eq!(state.roster.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_poll_goes_offline_at_once() {
        let provider = FakeProvider::unreachable();
        let rooms = FakeRoomApi::new();
        rooms.fail_polls_with(PresenceError::Unauthorized("HTTP 401".into()));
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;

        assert_eq!(rooms.poll_calls(), 1);
        assert_eq!(coord.connection_mode(), ConnectionMode::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn upgrade_probe_returns_to_realtime_and_stops_polling() {
        let provider = FakeProvider::unreachable();
        let rooms = FakeRoomApi::new();
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Polling);

        provider.set_reachable(true);
        tokio::time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Polling);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);

        let polls = rooms.poll_calls();
        tokio::time::advance(Duration::from_secs(50)).await;
        provider.emit(ProviderEvent::KeepAlive).await;
        settle().await;
        assert_eq!(rooms.poll_calls(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_recovers_through_polling_before_realtime() {
        let provider = FakeProvider::unreachable();
        let rooms = FakeRoomApi::new();
        rooms.fail_polls(true);
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(10)).await;
            settle().await;
        }
        assert_eq!(coord.connection_mode(), ConnectionMode::Offline);

        // Push is back, but probes are not honoured while offline.
        provider.set_reachable(true);
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Offline);
        let probes_while_offline = provider.subscribe_calls();

        rooms.fail_polls(false);
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Polling);
        assert_eq!(provider.subscribe_calls(), probes_while_offline);

        // Next probe (t = 60s) upgrades.
        tokio::time::advance(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);
    }

    #[tokio::test(start_paused = true)]
    async fn disable_tears_down_and_reenable_restarts_ladder() {
        let provider = FakeProvider::reachable();
        let rooms = FakeRoomApi::new();
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        provider.emit(upsert(PresenceMember::reader("a", "Ada"))).await;
        settle().await;

        coord.disable();
        coord.disable();
        settle().await;
        assert!(!coord.is_enabled());
        assert!(provider.latest_feed_closed());
        assert_eq!(coord.state(), PresenceState::default());

        coord.enable(RoomId::new("book-1"));
        settle().await;
        assert_eq!(provider.subscribe_calls(), 2);
        assert_eq!(coord.connection_mode(), ConnectionMode::Realtime);
    }

    #[tokio::test(start_paused = true)]
    async fn enabling_another_room_closes_previous_subscription() {
        let provider = FakeProvider::reachable();
        let rooms = FakeRoomApi::new();
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        settle().await;
        let first = provider.feed(0);

        coord.enable(RoomId::new("book-2"));
        settle().await;

        assert!(first.is_closed());
        assert_eq!(provider.subscribed_rooms(), vec!["book-1", "book-2"]);
        assert_eq!(coord.room_id(), Some(&RoomId::new("book-2")));
        assert_eq!(provider.open_feeds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enabling_same_room_twice_keeps_one_subscription() {
        let provider = FakeProvider::reachable();
        let rooms = FakeRoomApi::new();
        let mut coord = coordinator(&provider, &rooms);

        coord.enable(RoomId::new("book-1"));
        coord.enable(RoomId::new("book-1"));
        settle().await;
        assert_eq!(provider.subscribe_calls(), 1);
    }
}
