use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures raised by the presence and conversation collaborators.
///
/// Transport-level failures are recovered by the coordinator's fallback
/// ladder; join/leave failures surface once to the caller; access-check and
/// provisioning failures end the current conversation episode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("access check failed: {0}")]
    AccessCheckFailed(String),

    #[error("provisioning failed: {0}")]
    ProvisioningFailed(String),
}

impl PresenceError {
    /// Whether the failure is eligible for local fallback or retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PresenceError::TransientNetwork(_) | PresenceError::ChannelUnavailable(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
