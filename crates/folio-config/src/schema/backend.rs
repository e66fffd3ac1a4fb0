//! Backend endpoint configuration.

use serde::{Deserialize, Serialize};

/// Where the REST API and the realtime socket live.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub api_url: String,
    pub realtime_url: String,
    /// Publishable project key. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Session JWT for authenticated calls. Never written back out.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url)
            .field("realtime_url", &self.realtime_url)
            .field("api_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8787/api".into(),
            realtime_url: "ws://localhost:4000/socket/websocket".into(),
            api_key: String::new(),
            access_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let config = BackendConfig {
            api_key: "secret-key".into(),
            access_token: Some("secret-token".into()),
            ..Default::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(!dbg.contains("secret-token"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
