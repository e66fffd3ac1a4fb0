use serde::{Deserialize, Serialize};

use crate::protocol::PresencePayload;

/// The local reader as announced to the room.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Set when the local reader wrote the book being read.
    #[serde(default)]
    pub is_author: bool,
    /// Bearer token for authenticated channels and API calls.
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field("avatar_url", &self.avatar_url)
            .field("is_author", &self.is_author)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl Identity {
    /// Anonymous reader with a fresh id.
    pub fn generate(display_name: &str) -> Self {
        Self {
            user_id: folio_common::new_id(),
            display_name: display_name.to_string(),
            avatar_url: None,
            is_author: false,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Presence meta tracked for this reader on a realtime channel.
    pub fn to_presence(&self) -> PresencePayload {
        PresencePayload {
            user_id: Some(self.user_id.clone()),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            is_author: self.is_author,
            online_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}
