//! Timing knobs for the transport ladder.

use std::time::Duration;

/// Configuration for the presence channel coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound on a push subscription attempt.
    pub connect_timeout: Duration,
    /// Push feed silence (no delta, no keep-alive) that counts as lost.
    pub liveness_timeout: Duration,
    pub poll_interval: Duration,
    /// Consecutive failed polls before the mode drops to offline.
    pub max_poll_failures: u32,
    /// How often a polling coordinator re-attempts push.
    pub upgrade_probe_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            liveness_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            max_poll_failures: 3,
            upgrade_probe_interval: Duration::from_secs(30),
        }
    }
}
