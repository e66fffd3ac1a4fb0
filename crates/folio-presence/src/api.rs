//! Collaborator seams: the push provider, room RPCs, and conversation RPCs.
//!
//! Every controller receives these as `Arc<dyn …>` so rooms and episodes can
//! run side by side without shared module state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_common::{PresenceError, RoomId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::roster::{PresenceMember, RosterDelta};

// ---------------------------------------------------------------------------
// Push provider
// ---------------------------------------------------------------------------

/// Events a push provider delivers for one subscribed room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Delta(RosterDelta),
    /// Liveness signal with no roster change.
    KeepAlive,
    /// The feed is gone and will not deliver further events.
    Lost(String),
}

/// Consumer side of a push subscription, owned by exactly one session.
///
/// Unsubscribing is idempotent and also happens on drop.
pub struct Subscription {
    events: mpsc::Receiver<ProviderEvent>,
    cancel: CancellationToken,
}

/// Producer side of a push subscription, held by the provider's task.
#[derive(Clone)]
pub struct ProviderFeed {
    events: mpsc::Sender<ProviderEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Create a connected feed/subscription pair.
    pub fn channel(capacity: usize) -> (ProviderFeed, Subscription) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        (
            ProviderFeed {
                events: tx,
                cancel: cancel.clone(),
            },
            Subscription { events: rx, cancel },
        )
    }

    /// Next event, or `None` once the feed closed or we unsubscribed.
    pub async fn next_event(&mut self) -> Option<ProviderEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ProviderFeed {
    /// Deliver an event. Returns `false` once the subscriber has gone away.
    pub async fn send(&self, event: ProviderEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.events.send(event).await.is_ok()
    }

    /// Resolves when the subscriber unsubscribes or drops the subscription.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.events.is_closed()
    }
}

#[async_trait]
pub trait PresenceProvider: Send + Sync {
    /// Open a push subscription to a room's presence stream.
    async fn subscribe(&self, room: &RoomId) -> Result<Subscription, PresenceError>;
}

// ---------------------------------------------------------------------------
// Room RPCs
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RoomApi: Send + Sync {
    async fn join_room(&self, room: &RoomId) -> Result<(), PresenceError>;

    async fn leave_room(&self, room: &RoomId) -> Result<(), PresenceError>;

    async fn heartbeat(&self, room: &RoomId) -> Result<(), PresenceError>;

    /// Request/response roster fetch used when push is unavailable.
    async fn roster_poll(&self, room: &RoomId) -> Result<Vec<PresenceMember>, PresenceError>;
}

// ---------------------------------------------------------------------------
// Conversation RPCs
// ---------------------------------------------------------------------------

/// Latest known entitlement of the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGrant {
    pub is_premium: bool,
    pub checked_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn now(is_premium: bool) -> Self {
        Self {
            is_premium,
            checked_at: Utc::now(),
        }
    }
}

/// Provider-assigned handle of a freshly provisioned channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTicket {
    pub channel_id: String,
}

/// A watched, usable conversation channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationChannel {
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Entitlement check for the ambient identity.
    async fn check_access(&self) -> Result<AccessGrant, PresenceError>;

    async fn provision_channel(
        &self,
        room: &RoomId,
        participant_id: Option<&str>,
    ) -> Result<ChannelTicket, PresenceError>;

    async fn delete_channel(&self, channel_id: &str) -> Result<(), PresenceError>;
}

/// Chat session able to open and watch a provisioned channel.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn watch_channel(&self, channel_id: &str) -> Result<ConversationChannel, PresenceError>;
}
