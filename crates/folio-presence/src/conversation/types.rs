use std::fmt;
use std::time::Duration;

use crate::api::ConversationChannel;

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// How often a locked episode re-checks access.
    pub access_poll_interval: Duration,
    /// How long the ended notice stays up before the channel is deleted.
    pub grace_period: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            access_poll_interval: Duration::from_secs(30),
            grace_period: Duration::from_secs(7),
        }
    }
}

/// Why an episode stopped in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationFailure {
    #[error("access check failed: {0}")]
    AccessCheck(String),

    #[error("channel provisioning failed: {0}")]
    Provisioning(String),

    #[error("no chat client available")]
    NoClient,
}

impl ConversationFailure {
    /// Generic copy shown to the reader, whatever went wrong.
    pub fn user_message(&self) -> &'static str {
        "Chat unavailable"
    }
}

/// Display state of the ephemeral author conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    Checking,
    Locked,
    Connecting,
    Active(ConversationChannel),
    /// The author left; shown for the grace period.
    Ended,
    Error(ConversationFailure),
}

impl ConversationState {
    pub fn channel(&self) -> Option<&ConversationChannel> {
        match self {
            Self::Active(channel) => Some(channel),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Locked => "locked",
            Self::Connecting => "connecting",
            Self::Active(_) => "active",
            Self::Ended => "ended",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active(channel) => write!(f, "active({})", channel.channel_id),
            Self::Error(failure) => write!(f, "error({failure})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Inputs from the owning controller handle.
#[derive(Debug)]
pub(crate) enum Command {
    /// Privileged participant signal; `Some` carries the author's id.
    AuthorPresence(Option<String>),
    Focus,
    Shutdown,
}
