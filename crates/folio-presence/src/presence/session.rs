//! One live push subscription, normalized into roster snapshots.

use folio_common::{PresenceError, RoomId};
use tokio::sync::watch;
use tracing::debug;

use crate::api::{PresenceProvider, ProviderEvent, Subscription};
use crate::roster::RosterSnapshot;

/// What a session yields each time the provider speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Roster(RosterSnapshot),
    KeepAlive,
    Lost(String),
}

/// Wraps a single room subscription and keeps the merged roster.
///
/// Each delta produces a new snapshot, published to every `subscribe()`r.
pub struct TransportSession {
    room_id: RoomId,
    subscription: Option<Subscription>,
    roster_tx: watch::Sender<RosterSnapshot>,
}

impl TransportSession {
    /// Subscribe to `room_id`, starting from `seed` as the known roster.
    pub async fn open(
        provider: &dyn PresenceProvider,
        room_id: RoomId,
        seed: RosterSnapshot,
    ) -> Result<Self, PresenceError> {
        let subscription = provider.subscribe(&room_id).await.map_err(|e| match e {
            PresenceError::ChannelUnavailable(_) => e,
            other => PresenceError::ChannelUnavailable(other.to_string()),
        })?;
        debug!(room_id = %room_id, "Transport session opened");
        let (roster_tx, _) = watch::channel(seed);
        Ok(Self {
            room_id,
            subscription: Some(subscription),
            roster_tx,
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn subscribe(&self) -> watch::Receiver<RosterSnapshot> {
        self.roster_tx.subscribe()
    }

    pub fn roster(&self) -> RosterSnapshot {
        self.roster_tx.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Wait for the provider's next event and fold it into the roster.
    pub async fn next_update(&mut self) -> SessionUpdate {
        let Some(subscription) = self.subscription.as_mut() else {
            return SessionUpdate::Lost("session closed".into());
        };
        match subscription.next_event().await {
            Some(ProviderEvent::Delta(delta)) => {
                let next = self.roster_tx.borrow().apply(&delta);
                self.roster_tx.send_replace(next.clone());
                SessionUpdate::Roster(next)
            }
            Some(ProviderEvent::KeepAlive) => SessionUpdate::KeepAlive,
            Some(ProviderEvent::Lost(reason)) => SessionUpdate::Lost(reason),
            None => SessionUpdate::Lost("feed closed".into()),
        }
    }

    /// Unsubscribe and release the provider feed. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!(room_id = %self.room_id, "Transport session closed");
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}
