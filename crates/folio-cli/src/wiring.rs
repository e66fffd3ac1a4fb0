//! Config sections to runtime configs of the presence crate.

use std::time::Duration;

use folio_config::FolioConfig;
use folio_presence::{
    ConversationConfig, CoordinatorConfig, HttpConfig, Identity, MembershipConfig, RealtimeConfig,
};

fn secs(value: u32) -> Duration {
    Duration::from_secs(u64::from(value))
}

pub fn membership_config(config: &FolioConfig) -> MembershipConfig {
    MembershipConfig {
        heartbeat_interval: secs(config.presence.heartbeat_interval_secs),
    }
}

pub fn coordinator_config(config: &FolioConfig) -> CoordinatorConfig {
    let transport = &config.transport;
    CoordinatorConfig {
        connect_timeout: secs(transport.connect_timeout_secs),
        liveness_timeout: secs(transport.liveness_timeout_secs),
        poll_interval: secs(transport.poll_interval_secs),
        max_poll_failures: transport.max_poll_failures,
        upgrade_probe_interval: secs(transport.upgrade_probe_secs),
    }
}

pub fn conversation_config(config: &FolioConfig) -> ConversationConfig {
    ConversationConfig {
        access_poll_interval: secs(config.conversation.access_poll_secs),
        grace_period: secs(config.conversation.grace_period_secs),
    }
}

pub fn realtime_config(config: &FolioConfig) -> RealtimeConfig {
    RealtimeConfig {
        url: config.backend.realtime_url.clone(),
        api_key: config.backend.api_key.clone(),
        access_token: config.backend.access_token.clone(),
        connect_timeout: secs(config.transport.connect_timeout_secs),
        ..RealtimeConfig::default()
    }
}

pub fn http_config(config: &FolioConfig) -> HttpConfig {
    HttpConfig {
        base_url: config.backend.api_url.clone(),
        api_key: config.backend.api_key.clone(),
        access_token: config.backend.access_token.clone(),
        connect_timeout: secs(config.transport.connect_timeout_secs),
        ..HttpConfig::default()
    }
}

/// The local reader. Without an explicit id a fresh anonymous one is used.
pub fn identity(
    config: &FolioConfig,
    user_id: Option<&str>,
    display_name: &str,
    is_author: bool,
) -> Identity {
    let mut identity = Identity::generate(display_name);
    if let Some(id) = user_id {
        identity.user_id = id.to_string();
    }
    identity.is_author = is_author;
    identity.access_token = config.backend.access_token.clone();
    identity
}
