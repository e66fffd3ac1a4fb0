//! Presence, transport, and conversation configuration types.

use serde::{Deserialize, Serialize};

/// Room membership settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Seconds between liveness heartbeats while joined (valid range: 30-3600).
    pub heartbeat_interval_secs: u32,
    /// Avatars shown before the roster collapses into an overflow count.
    pub max_visible: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 300,
            max_visible: 5,
        }
    }
}

/// Push/poll transport ladder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_secs: u32,
    /// Push feed is considered lost after this long without a delta or keep-alive.
    pub liveness_timeout_secs: u32,
    pub poll_interval_secs: u32,
    /// Consecutive failed polls before the roster is marked offline.
    pub max_poll_failures: u32,
    pub upgrade_probe_secs: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            liveness_timeout_secs: 60,
            poll_interval_secs: 10,
            max_poll_failures: 3,
            upgrade_probe_secs: 30,
        }
    }
}

/// Ephemeral author conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub access_poll_secs: u32,
    pub grace_period_secs: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            access_poll_secs: 30,
            grace_period_secs: 7,
        }
    }
}
