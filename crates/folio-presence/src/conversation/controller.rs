use std::sync::Arc;

use folio_common::RoomId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::{ChatClient, ConversationBackend};
use crate::presentation::author_of;
use crate::roster::PresenceState;

use super::actor::ConversationActor;
use super::types::{Command, ConversationConfig, ConversationState};

/// Handle to the conversation state machine of one room.
///
/// The machine runs on its own task; this handle feeds it presence edges
/// and focus events and exposes the display state. `chat: None` means no
/// usable chat client, and any premium episode ends in `Error`.
pub struct EphemeralConversationController {
    room_id: RoomId,
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConversationState>,
    task: Option<JoinHandle<()>>,
    follower: Option<JoinHandle<()>>,
}

impl EphemeralConversationController {
    pub fn spawn(
        room_id: RoomId,
        backend: Arc<dyn ConversationBackend>,
        chat: Option<Arc<dyn ChatClient>>,
        config: ConversationConfig,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConversationState::Idle);
        let actor = ConversationActor::new(
            room_id.clone(),
            backend,
            chat,
            config,
            state_tx,
            commands_rx,
        );
        let task = tokio::spawn(actor.run());
        Self {
            room_id,
            commands,
            state_rx,
            task: Some(task),
            follower: None,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Feed the privileged participant signal: `Some(author_id)` while the
    /// author is in the room. Repeating the current value is a no-op.
    pub fn set_author_presence(&self, author: Option<String>) {
        let _ = self.commands.send(Command::AuthorPresence(author));
    }

    /// Window focus regained; a locked episode re-checks access right away.
    pub fn notify_focus(&self) {
        let _ = self.commands.send(Command::Focus);
    }

    pub fn state(&self) -> ConversationState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_rx.clone()
    }

    /// Derive presence edges from a coordinator's state stream instead of
    /// calling `set_author_presence` by hand. Replaces any earlier follower.
    pub fn follow_roster(&mut self, mut presence: watch::Receiver<PresenceState>) {
        self.stop_following();

        let commands = self.commands.clone();
        self.follower = Some(tokio::spawn(async move {
            let mut present = false;
            loop {
                let author = author_of(&presence.borrow_and_update().roster);
                if author.is_some() != present {
                    present = author.is_some();
                    if commands.send(Command::AuthorPresence(author)).is_err() {
                        break;
                    }
                }
                if presence.changed().await.is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_following(&mut self) {
        if let Some(follower) = self.follower.take() {
            follower.abort();
        }
    }

    /// Stop the machine, deleting any channel it still owns, and wait for
    /// the deletions to be sent.
    pub async fn shutdown(mut self) {
        self.stop_following();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!(room_id = %self.room_id, "Conversation controller shut down");
    }
}

impl Drop for EphemeralConversationController {
    /// Without an explicit shutdown the machine still flushes its channels
    /// in the background.
    fn drop(&mut self) {
        self.stop_following();
        if self.task.is_some() {
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}
