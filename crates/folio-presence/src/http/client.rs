//! HTTP client struct, URL building, auth, and error mapping.

use std::time::Duration;

use folio_common::{FolioError, PresenceError};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

#[derive(Clone)]
pub struct HttpConfig {
    /// Base URL of the REST API, e.g. `https://api.example.org/v1`.
    pub base_url: String,
    /// Publishable project key sent as the `apikey` header.
    pub api_key: String,
    /// Bearer token of the local reader.
    pub access_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787/api".to_string(),
            api_key: String::new(),
            access_token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Which RPC a request belongs to; decides how failures are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Join,
    Leave,
    Heartbeat,
    RosterPoll,
    AccessCheck,
    Provision,
    Delete,
    Watch,
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

impl Operation {
    /// The request never produced a response.
    pub(crate) fn transport_error(self, detail: String) -> PresenceError {
        match self {
            Operation::AccessCheck => PresenceError::AccessCheckFailed(detail),
            Operation::Provision | Operation::Watch => PresenceError::ProvisioningFailed(detail),
            _ => PresenceError::TransientNetwork(detail),
        }
    }

    /// The server answered with a non-success status.
    pub(crate) fn status_error(self, status: StatusCode, body: &str) -> PresenceError {
        let detail = format!("HTTP {status}: {}", truncate(body));
        let denied = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
        match self {
            Operation::Join | Operation::RosterPoll if denied => PresenceError::Unauthorized(detail),
            Operation::AccessCheck => PresenceError::AccessCheckFailed(detail),
            Operation::Provision | Operation::Watch => PresenceError::ProvisioningFailed(detail),
            _ => PresenceError::TransientNetwork(detail),
        }
    }

    /// Statuses that count as success besides 2xx.
    pub(crate) fn tolerates(self, status: StatusCode) -> bool {
        matches!(self, Operation::Delete) && status == StatusCode::NOT_FOUND
    }
}

/// REST client implementing `RoomApi`, `ConversationBackend` and
/// `ChatClient` against one API base URL.
pub struct HttpBackend {
    pub(crate) config: HttpConfig,
    pub(crate) http: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: HttpConfig) -> Result<Self, FolioError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| FolioError::Other(format!("invalid API url {}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(FolioError::Other(format!(
                "API url cannot carry paths: {}",
                config.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FolioError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http, base })
    }

    /// Base URL joined with percent-encoded path segments.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("apikey", &self.config.api_key);
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send an authorized request and classify any failure for `op`.
    pub(crate) async fn send(
        &self,
        op: Operation,
        request: RequestBuilder,
    ) -> Result<Response, PresenceError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| op.transport_error(e.to_string()))?;

        let status = response.status();
        if status.is_success() || op.tolerates(status) {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        debug!(?op, %status, "API request failed");
        Err(op.status_error(status, &text))
    }

    pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
        op: Operation,
        response: Response,
    ) -> Result<T, PresenceError> {
        response
            .json::<T>()
            .await
            .map_err(|e| op.transport_error(format!("malformed response: {e}")))
    }
}
