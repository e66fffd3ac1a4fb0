//! In-memory collaborators for controller tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use folio_common::{PresenceError, RoomId};

use crate::api::{
    AccessGrant, ChannelTicket, ChatClient, ConversationBackend, ConversationChannel,
    PresenceProvider, ProviderEvent, ProviderFeed, RoomApi, Subscription,
};
use crate::roster::PresenceMember;

/// Let spawned tasks run until they park again.
pub(crate) async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Presence provider
// ---------------------------------------------------------------------------

pub(crate) struct FakeProvider {
    reachable: AtomicBool,
    subscribe_calls: AtomicUsize,
    feeds: Mutex<Vec<(String, ProviderFeed)>>,
}

impl FakeProvider {
    fn with_reachability(reachable: bool) -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(reachable),
            subscribe_calls: AtomicUsize::new(0),
            feeds: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn reachable() -> Arc<Self> {
        Self::with_reachability(true)
    }

    pub(crate) fn unreachable() -> Arc<Self> {
        Self::with_reachability(false)
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn feed(&self, index: usize) -> ProviderFeed {
        self.feeds.lock().unwrap()[index].1.clone()
    }

    fn latest_feed(&self) -> Option<ProviderFeed> {
        self.feeds.lock().unwrap().last().map(|(_, feed)| feed.clone())
    }

    /// Push an event down the most recent subscription, if still open.
    pub(crate) async fn emit(&self, event: ProviderEvent) {
        if let Some(feed) = self.latest_feed() {
            feed.send(event).await;
        }
    }

    pub(crate) fn latest_feed_closed(&self) -> bool {
        self.latest_feed().is_some_and(|feed| feed.is_closed())
    }

    pub(crate) fn subscribed_rooms(&self) -> Vec<String> {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .map(|(room, _)| room.clone())
            .collect()
    }

    pub(crate) fn open_feeds(&self) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, feed)| !feed.is_closed())
            .count()
    }
}

#[async_trait]
impl PresenceProvider for FakeProvider {
    async fn subscribe(&self, room: &RoomId) -> Result<Subscription, PresenceError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(PresenceError::ChannelUnavailable("provider unreachable".into()));
        }
        let (feed, subscription) = Subscription::channel(16);
        self.feeds
            .lock()
            .unwrap()
            .push((room.as_str().to_string(), feed));
        Ok(subscription)
    }
}

// ---------------------------------------------------------------------------
// Room RPCs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeRoomApi {
    join_error: Mutex<Option<PresenceError>>,
    fail_leave: AtomicBool,
    fail_heartbeats: AtomicBool,
    fail_polls: AtomicBool,
    poll_error: Mutex<Option<PresenceError>>,
    roster: Mutex<Vec<PresenceMember>>,
    join_calls: AtomicUsize,
    leave_calls: AtomicUsize,
    left: Mutex<Vec<String>>,
    heartbeat_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl FakeRoomApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reject_join(&self, error: PresenceError) {
        *self.join_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn fail_leave(&self, fail: bool) {
        self.fail_leave.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_heartbeats(&self, fail: bool) {
        self.fail_heartbeats.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    /// Answer every poll with `error` instead of a transient failure.
    pub(crate) fn fail_polls_with(&self, error: PresenceError) {
        *self.poll_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn set_roster(&self, members: Vec<PresenceMember>) {
        *self.roster.lock().unwrap() = members;
    }

    pub(crate) fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn leave_calls(&self) -> usize {
        self.leave_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn left_rooms(&self) -> Vec<String> {
        self.left.lock().unwrap().clone()
    }

    pub(crate) fn heartbeat_calls(&self) -> usize {
        self.heartbeat_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomApi for FakeRoomApi {
    async fn join_room(&self, _room: &RoomId) -> Result<(), PresenceError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        match self.join_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn leave_room(&self, room: &RoomId) -> Result<(), PresenceError> {
        self.leave_calls.fetch_add(1, Ordering::SeqCst);
        self.left.lock().unwrap().push(room.as_str().to_string());
        if self.fail_leave.load(Ordering::SeqCst) {
            return Err(PresenceError::TransientNetwork("leave timed out".into()));
        }
        Ok(())
    }

    async fn heartbeat(&self, _room: &RoomId) -> Result<(), PresenceError> {
        self.heartbeat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_heartbeats.load(Ordering::SeqCst) {
            return Err(PresenceError::TransientNetwork("heartbeat timed out".into()));
        }
        Ok(())
    }

    async fn roster_poll(&self, _room: &RoomId) -> Result<Vec<PresenceMember>, PresenceError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.poll_error.lock().unwrap().clone() {
            return Err(e);
        }
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(PresenceError::TransientNetwork("poll timed out".into()));
        }
        Ok(self.roster.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Conversation RPCs
// ---------------------------------------------------------------------------

/// Scripted conversation backend.
///
/// Access answers are consumed in order; the last one repeats. Calls are
/// logged as `check`, `provision:<id>` and `delete:<id>`.
pub(crate) struct FakeConversationBackend {
    access: Mutex<VecDeque<Result<bool, PresenceError>>>,
    fail_provision: AtomicBool,
    fail_delete: AtomicBool,
    provision_delay: Mutex<Option<Duration>>,
    next_channel: AtomicUsize,
    participants: Mutex<Vec<Option<String>>>,
    log: Mutex<Vec<String>>,
}

impl FakeConversationBackend {
    pub(crate) fn scripted(access: Vec<Result<bool, PresenceError>>) -> Arc<Self> {
        Arc::new(Self {
            access: Mutex::new(access.into()),
            fail_provision: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            provision_delay: Mutex::new(None),
            next_channel: AtomicUsize::new(0),
            participants: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn premium() -> Arc<Self> {
        Self::scripted(vec![Ok(true)])
    }

    pub(crate) fn free() -> Arc<Self> {
        Self::scripted(vec![Ok(false)])
    }

    /// Replace the remaining script with a single repeating answer.
    pub(crate) fn set_access(&self, answer: Result<bool, PresenceError>) {
        let mut access = self.access.lock().unwrap();
        access.clear();
        access.push_back(answer);
    }

    pub(crate) fn fail_provision(&self, fail: bool) {
        self.fail_provision.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn delay_provision(&self, delay: Duration) {
        *self.provision_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn check_calls(&self) -> usize {
        self.calls().iter().filter(|c| *c == "check").count()
    }

    pub(crate) fn provisioned(&self) -> Vec<String> {
        self.prefixed("provision:")
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.prefixed("delete:")
    }

    pub(crate) fn participants(&self) -> Vec<Option<String>> {
        self.participants.lock().unwrap().clone()
    }

    fn prefixed(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ConversationBackend for FakeConversationBackend {
    async fn check_access(&self) -> Result<AccessGrant, PresenceError> {
        self.record("check".into());
        let answer = {
            let mut access = self.access.lock().unwrap();
            if access.len() > 1 {
                access.pop_front()
            } else {
                access.front().cloned()
            }
        };
        match answer {
            Some(Ok(is_premium)) => Ok(AccessGrant::now(is_premium)),
            Some(Err(e)) => Err(e),
            None => Ok(AccessGrant::now(false)),
        }
    }

    async fn provision_channel(
        &self,
        _room: &RoomId,
        participant_id: Option<&str>,
    ) -> Result<ChannelTicket, PresenceError> {
        let delay = *self.provision_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_provision.load(Ordering::SeqCst) {
            self.record("provision-failed".into());
            return Err(PresenceError::ProvisioningFailed("quota exceeded".into()));
        }
        let n = self.next_channel.fetch_add(1, Ordering::SeqCst) + 1;
        let channel_id = format!("chan-{n}");
        self.participants
            .lock()
            .unwrap()
            .push(participant_id.map(str::to_string));
        self.record(format!("provision:{channel_id}"));
        Ok(ChannelTicket { channel_id })
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), PresenceError> {
        self.record(format!("delete:{channel_id}"));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(PresenceError::TransientNetwork("delete timed out".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeChat {
    fail: AtomicBool,
    watched: Mutex<Vec<String>>,
}

impl FakeChat {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing() -> Arc<Self> {
        let chat = Self::default();
        chat.fail.store(true, Ordering::SeqCst);
        Arc::new(chat)
    }

    pub(crate) fn watched(&self) -> Vec<String> {
        self.watched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn watch_channel(&self, channel_id: &str) -> Result<ConversationChannel, PresenceError> {
        self.watched.lock().unwrap().push(channel_id.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(PresenceError::ProvisioningFailed("watch rejected".into()));
        }
        Ok(ConversationChannel {
            channel_id: channel_id.to_string(),
            created_at: Utc::now(),
        })
    }
}
