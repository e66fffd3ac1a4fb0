//! Validation for the presence, transport, and conversation sections.

use crate::schema::FolioConfig;

use super::helpers::validate_range;

pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &FolioConfig) {
    let p = &config.presence;
    validate_range(
        errors,
        "presence.heartbeat_interval_secs",
        p.heartbeat_interval_secs,
        30,
        3600,
    );
    validate_range(errors, "presence.max_visible", p.max_visible, 1, 50);
}

pub(crate) fn validate_transport(errors: &mut Vec<String>, config: &FolioConfig) {
    let t = &config.transport;
    validate_range(
        errors,
        "transport.connect_timeout_secs",
        t.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "transport.liveness_timeout_secs",
        t.liveness_timeout_secs,
        5,
        600,
    );
    validate_range(
        errors,
        "transport.poll_interval_secs",
        t.poll_interval_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "transport.max_poll_failures",
        t.max_poll_failures,
        1,
        20,
    );
    validate_range(
        errors,
        "transport.upgrade_probe_secs",
        t.upgrade_probe_secs,
        5,
        600,
    );
}

pub(crate) fn validate_conversation(errors: &mut Vec<String>, config: &FolioConfig) {
    let c = &config.conversation;
    validate_range(
        errors,
        "conversation.access_poll_secs",
        c.access_poll_secs,
        5,
        600,
    );
    validate_range(
        errors,
        "conversation.grace_period_secs",
        c.grace_period_secs,
        1,
        120,
    );
}
