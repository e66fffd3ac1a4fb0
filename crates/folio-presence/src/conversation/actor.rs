//! Single task owning one controller's episodes, timers and channel ids.
//!
//! RPCs run in spawned tasks and report back tagged with the generation of
//! the episode that started them; results from an earlier generation are
//! discarded (and any channel they created is deleted).

use std::future::pending;
use std::sync::Arc;

use folio_common::{new_correlation_id, PresenceError, RoomId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::api::{AccessGrant, ChannelTicket, ChatClient, ConversationBackend, ConversationChannel};

use super::types::{Command, ConversationConfig, ConversationFailure, ConversationState};

enum Outcome {
    Access(Result<AccessGrant, PresenceError>),
    Provisioned(Result<ChannelTicket, PresenceError>),
    Watched {
        channel_id: String,
        result: Result<ConversationChannel, PresenceError>,
    },
}

struct OpResult {
    generation: u64,
    outcome: Outcome,
}

/// One continuous interval with the author present.
struct Episode {
    generation: u64,
    /// Short id tying together the log lines of one episode.
    trace_id: String,
    participant: Option<String>,
    cancel: CancellationToken,
    /// Channel provisioned for this episode, active or not.
    channel_id: Option<String>,
    /// Waiting for the previous episode's teardown before provisioning.
    provision_deferred: bool,
    next_access_poll: Option<Instant>,
    check_in_flight: bool,
}

/// A channel whose ended notice is showing; deleted at `deadline`.
struct Teardown {
    channel_id: String,
    deadline: Instant,
}

pub(crate) struct ConversationActor {
    room_id: RoomId,
    backend: Arc<dyn ConversationBackend>,
    chat: Option<Arc<dyn ChatClient>>,
    config: ConversationConfig,
    state_tx: watch::Sender<ConversationState>,
    commands: mpsc::UnboundedReceiver<Command>,
    results_tx: mpsc::UnboundedSender<OpResult>,
    results: mpsc::UnboundedReceiver<OpResult>,
    generation: u64,
    episode: Option<Episode>,
    teardown: Option<Teardown>,
    deletions: Vec<JoinHandle<()>>,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

impl ConversationActor {
    pub(crate) fn new(
        room_id: RoomId,
        backend: Arc<dyn ConversationBackend>,
        chat: Option<Arc<dyn ChatClient>>,
        config: ConversationConfig,
        state_tx: watch::Sender<ConversationState>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (results_tx, results) = mpsc::unbounded_channel();
        Self {
            room_id,
            backend,
            chat,
            config,
            state_tx,
            commands,
            results_tx,
            results,
            generation: 0,
            episode: None,
            teardown: None,
            deletions: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let grace_deadline = self.teardown.as_ref().map(|t| t.deadline);
            let poll_deadline = self.episode.as_ref().and_then(|e| e.next_access_poll);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::AuthorPresence(Some(participant))) => self.on_author_present(participant),
                    Some(Command::AuthorPresence(None)) => self.on_author_absent(),
                    Some(Command::Focus) => self.on_focus(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(result) = self.results.recv() => self.on_result(result),
                _ = sleep_until_opt(grace_deadline) => self.on_grace_elapsed(),
                _ = sleep_until_opt(poll_deadline) => self.on_access_poll(),
            }
        }

        self.flush().await;
    }

    fn state(&self) -> ConversationState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, next: ConversationState) {
        let mut from = "";
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            from = state.name();
            *state = next.clone();
            true
        });
        if changed {
            info!(room_id = %self.room_id, from, to = %next, "Conversation state changed");
        }
    }

    // -- presence edges ----------------------------------------------------

    fn on_author_present(&mut self, participant: String) {
        if self.episode.is_some() {
            trace!(room_id = %self.room_id, "Author already present, ignoring");
            return;
        }

        self.generation += 1;
        let trace_id = new_correlation_id();
        info!(room_id = %self.room_id, episode = %trace_id, participant = %participant, "Author arrived");
        self.episode = Some(Episode {
            generation: self.generation,
            trace_id,
            participant: Some(participant),
            cancel: CancellationToken::new(),
            channel_id: None,
            provision_deferred: false,
            next_access_poll: None,
            check_in_flight: false,
        });
        self.set_state(ConversationState::Checking);
        self.spawn_access_check();
    }

    fn on_author_absent(&mut self) {
        let Some(episode) = self.episode.take() else {
            return;
        };
        episode.cancel.cancel();
        info!(room_id = %self.room_id, episode = %episode.trace_id, "Author left");

        match (self.state(), episode.channel_id) {
            (ConversationState::Active(channel), _) => {
                if let Some(previous) = self.teardown.take() {
                    self.spawn_delete(previous.channel_id);
                }
                self.teardown = Some(Teardown {
                    channel_id: channel.channel_id,
                    deadline: Instant::now() + self.config.grace_period,
                });
                self.set_state(ConversationState::Ended);
            }
            (_, leftover) => {
                if let Some(channel_id) = leftover {
                    debug!(room_id = %self.room_id, channel_id = %channel_id, "Deleting channel that never became active");
                    self.spawn_delete(channel_id);
                }
                self.set_state(ConversationState::Idle);
            }
        }
    }

    fn on_focus(&mut self) {
        let locked = matches!(self.state(), ConversationState::Locked);
        let idle_check = self.episode.as_ref().is_some_and(|e| !e.check_in_flight);
        if locked && idle_check {
            debug!(room_id = %self.room_id, "Focus regained, re-checking access");
            self.spawn_access_check();
        }
    }

    // -- timers ------------------------------------------------------------

    fn on_access_poll(&mut self) {
        let Some(episode) = self.episode.as_mut() else {
            return;
        };
        episode.next_access_poll = None;
        if episode.check_in_flight {
            return;
        }
        trace!(room_id = %self.room_id, "Polling access");
        self.spawn_access_check();
    }

    fn on_grace_elapsed(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };
        info!(room_id = %self.room_id, channel_id = %teardown.channel_id, "Grace period over, deleting channel");
        self.spawn_delete(teardown.channel_id);

        if matches!(self.state(), ConversationState::Ended) {
            self.set_state(ConversationState::Idle);
        }

        let deferred = self
            .episode
            .as_mut()
            .is_some_and(|e| std::mem::take(&mut e.provision_deferred));
        if deferred {
            self.spawn_provision();
        }
    }

    // -- RPC results -------------------------------------------------------

    fn on_result(&mut self, result: OpResult) {
        let current = self.episode.as_ref().map(|e| e.generation);
        if current != Some(result.generation) {
            self.discard_stale(result);
            return;
        }

        match result.outcome {
            Outcome::Access(outcome) => self.on_access_result(outcome),
            Outcome::Provisioned(outcome) => self.on_provisioned(outcome),
            Outcome::Watched { channel_id, result } => self.on_watched(channel_id, result),
        }
    }

    fn discard_stale(&mut self, result: OpResult) {
        match result.outcome {
            Outcome::Provisioned(Ok(ticket)) => {
                debug!(
                    room_id = %self.room_id,
                    generation = result.generation,
                    channel_id = %ticket.channel_id,
                    "Provisioned channel arrived after its episode ended, deleting"
                );
                self.spawn_delete(ticket.channel_id);
            }
            _ => trace!(room_id = %self.room_id, generation = result.generation, "Discarding stale result"),
        }
    }

    fn on_access_result(&mut self, outcome: Result<AccessGrant, PresenceError>) {
        let poll_every = self.config.access_poll_interval;
        let gating = matches!(self.state(), ConversationState::Checking | ConversationState::Locked);
        let Some(episode) = self.episode.as_mut() else {
            return;
        };
        episode.check_in_flight = false;
        if !gating {
            return;
        }

        match outcome {
            Ok(grant) if grant.is_premium => {
                episode.next_access_poll = None;
                self.set_state(ConversationState::Connecting);
                self.start_connecting();
            }
            Ok(_) => {
                episode.next_access_poll = Some(Instant::now() + poll_every);
                self.set_state(ConversationState::Locked);
            }
            Err(e) => {
                episode.next_access_poll = None;
                warn!(room_id = %self.room_id, error = %e, "Access check failed");
                self.set_state(ConversationState::Error(ConversationFailure::AccessCheck(
                    e.to_string(),
                )));
            }
        }
    }

    fn start_connecting(&mut self) {
        if self.chat.is_none() {
            warn!(room_id = %self.room_id, "No chat client, cannot open conversation");
            self.set_state(ConversationState::Error(ConversationFailure::NoClient));
            return;
        }

        let teardown_pending = self.teardown.is_some();
        let Some(episode) = self.episode.as_mut() else {
            return;
        };
        if let Some(channel_id) = episode.channel_id.clone() {
            self.spawn_watch(channel_id);
        } else if teardown_pending {
            debug!(room_id = %self.room_id, "Previous channel still in grace, deferring provisioning");
            episode.provision_deferred = true;
        } else {
            self.spawn_provision();
        }
    }

    fn on_provisioned(&mut self, outcome: Result<ChannelTicket, PresenceError>) {
        match outcome {
            Ok(ticket) => {
                debug!(room_id = %self.room_id, channel_id = %ticket.channel_id, "Channel provisioned");
                if let Some(episode) = self.episode.as_mut() {
                    episode.channel_id = Some(ticket.channel_id.clone());
                }
                self.spawn_watch(ticket.channel_id);
            }
            Err(e) => {
                warn!(room_id = %self.room_id, error = %e, "Channel provisioning failed");
                self.set_state(ConversationState::Error(ConversationFailure::Provisioning(
                    e.to_string(),
                )));
            }
        }
    }

    fn on_watched(&mut self, channel_id: String, result: Result<ConversationChannel, PresenceError>) {
        match result {
            Ok(channel) => self.set_state(ConversationState::Active(channel)),
            Err(e) => {
                warn!(room_id = %self.room_id, channel_id = %channel_id, error = %e, "Could not open channel");
                if let Some(episode) = self.episode.as_mut() {
                    episode.channel_id = None;
                }
                self.spawn_delete(channel_id);
                self.set_state(ConversationState::Error(ConversationFailure::Provisioning(
                    e.to_string(),
                )));
            }
        }
    }

    // -- spawned operations ------------------------------------------------

    fn spawn_access_check(&mut self) {
        let Some(episode) = self.episode.as_mut() else {
            return;
        };
        episode.check_in_flight = true;
        episode.next_access_poll = None;

        let generation = episode.generation;
        let cancel = episode.cancel.clone();
        let backend = Arc::clone(&self.backend);
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                outcome = backend.check_access() => outcome,
            };
            let _ = tx.send(OpResult {
                generation,
                outcome: Outcome::Access(outcome),
            });
        });
    }

    /// Provisioning is never cancelled: a late ticket must still come back
    /// so the channel can be deleted.
    fn spawn_provision(&mut self) {
        let Some(episode) = self.episode.as_ref() else {
            return;
        };
        let generation = episode.generation;
        let participant = episode.participant.clone();
        let prior_deletions: Vec<JoinHandle<()>> = self.deletions.drain(..).collect();
        let backend = Arc::clone(&self.backend);
        let room_id = self.room_id.clone();
        let tx = self.results_tx.clone();

        tokio::spawn(async move {
            for deletion in prior_deletions {
                let _ = deletion.await;
            }
            let outcome = backend
                .provision_channel(&room_id, participant.as_deref())
                .await;
            let _ = tx.send(OpResult {
                generation,
                outcome: Outcome::Provisioned(outcome),
            });
        });
    }

    fn spawn_watch(&mut self, channel_id: String) {
        let (Some(episode), Some(chat)) = (self.episode.as_ref(), self.chat.as_ref()) else {
            return;
        };
        let generation = episode.generation;
        let cancel = episode.cancel.clone();
        let chat = Arc::clone(chat);
        let tx = self.results_tx.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = chat.watch_channel(&channel_id) => result,
            };
            let _ = tx.send(OpResult {
                generation,
                outcome: Outcome::Watched { channel_id, result },
            });
        });
    }

    /// Best-effort; failures are logged and never reach the display state.
    fn spawn_delete(&mut self, channel_id: String) {
        let backend = Arc::clone(&self.backend);
        let room_id = self.room_id.clone();
        self.deletions.retain(|d| !d.is_finished());
        self.deletions.push(tokio::spawn(async move {
            match backend.delete_channel(&channel_id).await {
                Ok(()) => debug!(room_id = %room_id, channel_id = %channel_id, "Channel deleted"),
                Err(e) => {
                    warn!(room_id = %room_id, channel_id = %channel_id, error = %e, "Channel deletion failed")
                }
            }
        }));
    }

    /// Shutdown: delete everything this controller still owns and wait for
    /// the deletions to go out.
    async fn flush(&mut self) {
        if let Some(episode) = self.episode.take() {
            episode.cancel.cancel();
            if let Some(channel_id) = episode.channel_id {
                self.spawn_delete(channel_id);
            }
        }
        if let Some(teardown) = self.teardown.take() {
            self.spawn_delete(teardown.channel_id);
        }
        for deletion in self.deletions.drain(..) {
            let _ = deletion.await;
        }
        self.set_state(ConversationState::Idle);
        debug!(room_id = %self.room_id, "Conversation controller stopped");
    }
}
