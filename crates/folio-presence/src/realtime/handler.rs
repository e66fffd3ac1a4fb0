//! Translation of incoming Phoenix messages into provider events.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ProviderEvent;
use crate::protocol::{events, PresencePayload};
use crate::roster::{PresenceMember, RosterDelta};

use super::types::PhoenixMessage;

type Metas = Vec<Value>;

/// Parse a Phoenix presence map into `HashMap<key, Vec<meta>>`.
///
/// Presence arrives as `{ "key": { "metas": [{ ... }] } }`.
pub(crate) fn parse_presence_map(value: &Value) -> HashMap<String, Metas> {
    let mut result = HashMap::new();
    if let Some(obj) = value.as_object() {
        for (key, val) in obj {
            if let Some(metas) = val.get("metas").and_then(|m| m.as_array()) {
                result.insert(key.clone(), metas.clone());
            }
        }
    }
    result
}

/// Identity of one meta: its `phx_ref`, or the whole meta when it has none.
fn meta_ref(meta: &Value) -> Value {
    meta.get("phx_ref").cloned().unwrap_or_else(|| meta.clone())
}

/// A key's member, decoded from its most recent meta.
fn member_of(key: &str, metas: &[Value]) -> Option<PresenceMember> {
    let meta = metas.last()?;
    match serde_json::from_value::<PresencePayload>(meta.clone()) {
        Ok(payload) => Some(payload.into_member(key)),
        Err(e) => {
            debug!(key = %key, error = %e, "Skipping undecodable presence meta");
            None
        }
    }
}

/// Metas per presence key on one channel. A key stays present while any of
/// its metas (one per connected tab or device) remains.
#[derive(Debug, Default)]
pub(crate) struct PresenceTracker {
    state: HashMap<String, Metas>,
}

impl PresenceTracker {
    /// Full sync: replaces everything known.
    pub(crate) fn sync_state(&mut self, state: HashMap<String, Metas>) -> RosterDelta {
        self.state = state.into_iter().filter(|(_, m)| !m.is_empty()).collect();
        RosterDelta::Reset(
            self.state
                .iter()
                .filter_map(|(key, metas)| member_of(key, metas))
                .collect(),
        )
    }

    /// Fold one diff in and describe its net effect as a single delta.
    /// Joins are merged before leaves, so a meta update (the same key in
    /// both) ends as an upsert.
    pub(crate) fn sync_diff(
        &mut self,
        joins: HashMap<String, Metas>,
        leaves: HashMap<String, Metas>,
    ) -> Option<RosterDelta> {
        let mut touched = BTreeSet::new();

        for (key, joined) in joins {
            let refs: Vec<Value> = joined.iter().map(meta_ref).collect();
            let metas = self.state.entry(key.clone()).or_default();
            metas.retain(|m| !refs.contains(&meta_ref(m)));
            metas.extend(joined);
            touched.insert(key);
        }

        for (key, left) in leaves {
            let refs: Vec<Value> = left.iter().map(meta_ref).collect();
            if let Some(metas) = self.state.get_mut(&key) {
                metas.retain(|m| !refs.contains(&meta_ref(m)));
                if metas.is_empty() {
                    self.state.remove(&key);
                }
            }
            touched.insert(key);
        }

        let mut changes: Vec<RosterDelta> = touched
            .into_iter()
            .map(|key| match self.state.get(&key).and_then(|m| member_of(&key, m)) {
                Some(member) => RosterDelta::Upsert(member),
                None => RosterDelta::Remove(key),
            })
            .collect();
        match changes.len() {
            0 => None,
            1 => changes.pop(),
            _ => Some(RosterDelta::Batch(changes)),
        }
    }
}

fn reply_reason(payload: &Value) -> String {
    payload
        .get("response")
        .and_then(|r| r.get("reason"))
        .and_then(|r| r.as_str())
        .unwrap_or("unknown error")
        .to_string()
}

/// Turns the messages of one joined channel into provider events, keeping
/// that channel's presence state between messages.
#[derive(Debug)]
pub(crate) struct ChannelTranslator {
    topic: String,
    presence: PresenceTracker,
}

impl ChannelTranslator {
    pub(crate) fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            presence: PresenceTracker::default(),
        }
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    /// Heartbeat replies on the `phoenix` topic count as keep-alives for
    /// every channel on the socket. One message never yields more than one
    /// roster delta.
    pub(crate) fn translate(&mut self, msg: &PhoenixMessage) -> Vec<ProviderEvent> {
        if msg.topic == "phoenix" {
            return match msg.event.as_str() {
                events::PHX_REPLY => vec![ProviderEvent::KeepAlive],
                _ => Vec::new(),
            };
        }
        let topic = self.topic.as_str();
        if msg.topic != topic {
            debug!(topic = %msg.topic, "Message for another topic");
            return Vec::new();
        }

        match msg.event.as_str() {
            events::PHX_REPLY => {
                let status = msg.payload.get("status").and_then(|s| s.as_str());
                if status == Some("ok") {
                    vec![ProviderEvent::KeepAlive]
                } else {
                    let reason = reply_reason(&msg.payload);
                    warn!(topic = %topic, status = ?status, reason = %reason, "Channel reply error");
                    vec![ProviderEvent::Lost(format!("channel rejected: {reason}"))]
                }
            }
            events::PHX_ERROR => {
                warn!(topic = %topic, "Channel error");
                vec![ProviderEvent::Lost("channel error".into())]
            }
            events::PHX_CLOSE => {
                debug!(topic = %topic, "Channel closed");
                vec![ProviderEvent::Lost("channel closed".into())]
            }
            events::PRESENCE_STATE => {
                let state = parse_presence_map(&msg.payload);
                debug!(topic = %topic, keys = state.len(), "Presence state received");
                vec![ProviderEvent::Delta(self.presence.sync_state(state))]
            }
            events::PRESENCE_DIFF => {
                let joins = msg
                    .payload
                    .get("joins")
                    .map(parse_presence_map)
                    .unwrap_or_default();
                let leaves = msg
                    .payload
                    .get("leaves")
                    .map(parse_presence_map)
                    .unwrap_or_default();
                debug!(
                    topic = %topic,
                    joins = joins.len(),
                    leaves = leaves.len(),
                    "Presence diff received"
                );
                self.presence
                    .sync_diff(joins, leaves)
                    .map(ProviderEvent::Delta)
                    .into_iter()
                    .collect()
            }
            _ => {
                debug!(topic = %topic, event = %msg.event, "Unhandled Phoenix event");
                Vec::new()
            }
        }
    }
}
