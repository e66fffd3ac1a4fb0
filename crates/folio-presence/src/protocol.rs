//! Wire payloads shared by the realtime provider and the HTTP backend.
//!
//! The realtime envelope (Phoenix Channels) lives in `realtime::types`;
//! these are the application-level bodies riding inside it, plus the REST
//! request/response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ChannelTicket, ConversationChannel};
use crate::roster::PresenceMember;

/// Event names used on a room channel.
pub mod events {
    pub const PHX_JOIN: &str = "phx_join";
    pub const PHX_LEAVE: &str = "phx_leave";
    pub const PHX_REPLY: &str = "phx_reply";
    pub const PHX_ERROR: &str = "phx_error";
    pub const PHX_CLOSE: &str = "phx_close";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const PRESENCE: &str = "presence";
    pub const PRESENCE_STATE: &str = "presence_state";
    pub const PRESENCE_DIFF: &str = "presence_diff";
}

/// Presence meta tracked for each reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// Absent in some metas; the presence key is used instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_author: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_at: Option<String>,
}

impl PresencePayload {
    pub fn into_member(self, key: &str) -> PresenceMember {
        let id = self.user_id.unwrap_or_else(|| key.to_string());
        let display_name = if self.display_name.is_empty() {
            id.clone()
        } else {
            self.display_name
        };
        PresenceMember {
            id,
            display_name,
            avatar_ref: self.avatar_url,
            is_author: self.is_author,
        }
    }
}

// ---------------------------------------------------------------------------
// REST bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RosterResponse {
    #[serde(default)]
    pub members: Vec<PresencePayload>,
}

impl RosterResponse {
    pub fn into_members(self) -> Vec<PresenceMember> {
        self.members
            .into_iter()
            .enumerate()
            .map(|(i, payload)| payload.into_member(&format!("anonymous-{i}")))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessResponse {
    pub is_premium: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionRequest<'a> {
    pub room_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionResponse {
    pub channel_id: String,
}

impl From<ProvisionResponse> for ChannelTicket {
    fn from(resp: ProvisionResponse) -> Self {
        Self {
            channel_id: resp.channel_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelResponse {
    pub channel_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ChannelResponse> for ConversationChannel {
    fn from(resp: ChannelResponse) -> Self {
        Self {
            channel_id: resp.channel_id,
            created_at: resp.created_at.unwrap_or_else(Utc::now),
        }
    }
}
