//! Configuration and Phoenix protocol types for the realtime provider.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint, e.g. `wss://example.org/realtime/v1/websocket`.
    pub url: String,
    /// Publishable project key sent as the `apikey` query parameter.
    pub api_key: String,
    /// Optional JWT for authenticated channels.
    pub access_token: Option<String>,
    /// Phoenix heartbeat interval in seconds (default: 25).
    pub heartbeat_interval_secs: u64,
    /// Bound on connecting and on waiting for the join reply.
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:4000/socket/websocket".to_string(),
            api_key: String::new(),
            access_token: None,
            heartbeat_interval_secs: 25,
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl RealtimeConfig {
    pub(crate) fn ws_url(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}apikey={}&vsn=1.0.0", self.url, self.api_key)
    }

    pub(crate) fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Phoenix protocol
// ---------------------------------------------------------------------------

/// A Phoenix protocol message envelope (v1 JSON format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
    #[serde(rename = "ref")]
    pub msg_ref: Option<String>,
}

static REF_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_ref() -> String {
    REF_COUNTER.fetch_add(1, Ordering::Relaxed).to_string()
}

impl PhoenixMessage {
    pub(crate) fn new(topic: &str, event: &str, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            msg_ref: Some(next_ref()),
        }
    }

    pub(crate) fn heartbeat() -> Self {
        Self::new("phoenix", crate::protocol::events::HEARTBEAT, serde_json::json!({}))
    }
}

/// `realtime:room:<id>` for a room.
pub(crate) fn channel_topic(room: &folio_common::RoomId) -> String {
    format!("realtime:{}", room.topic())
}

/// Join payload for a presence-only room channel.
pub(crate) fn join_payload(presence_key: &str, access_token: Option<&str>) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "config": {
            "broadcast": { "self": false, "ack": false },
            "presence": { "key": presence_key }
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = serde_json::json!(token);
    }
    payload
}
