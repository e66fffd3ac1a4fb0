use async_trait::async_trait;
use folio_common::{PresenceError, RoomId};
use futures_util::{Stream, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};

use crate::api::{PresenceProvider, ProviderEvent, Subscription};
use crate::identity::Identity;
use crate::protocol::events;

use super::connection::{run_channel, send_message};
use super::handler::ChannelTranslator;
use super::types::{channel_topic, join_payload, PhoenixMessage, RealtimeConfig};

const FEED_CAPACITY: usize = 256;

/// Push provider speaking Phoenix Channels over WebSocket.
///
/// With an identity attached, the local reader is tracked on every joined
/// channel so other readers see them in their rosters.
pub struct RealtimeProvider {
    config: RealtimeConfig,
    identity: Option<Identity>,
}

impl RealtimeProvider {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    fn access_token(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .and_then(|i| i.access_token.as_deref())
            .or(self.config.access_token.as_deref())
    }
}

/// Read until the reply to `join_ref` arrives. Events seen before it are
/// returned so nothing is dropped.
async fn await_join_reply<R>(
    read: &mut R,
    translator: &mut ChannelTranslator,
    join_ref: &str,
) -> Result<Vec<ProviderEvent>, PresenceError>
where
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let mut early = Vec::new();
    while let Some(frame) = read.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(PresenceError::ChannelUnavailable(e.to_string())),
        };
        let Ok(msg) = serde_json::from_str::<PhoenixMessage>(&text) else {
            continue;
        };
        let is_join_reply = msg.topic == translator.topic()
            && msg.event == events::PHX_REPLY
            && msg.msg_ref.as_deref() == Some(join_ref);
        if !is_join_reply {
            early.extend(translator.translate(&msg));
            continue;
        }
        return match msg.payload.get("status").and_then(|s| s.as_str()) {
            Some("ok") => Ok(early),
            _ => {
                let reason = msg
                    .payload
                    .get("response")
                    .and_then(|r| r.get("reason"))
                    .and_then(|r| r.as_str())
                    .unwrap_or("join rejected");
                Err(PresenceError::ChannelUnavailable(reason.to_string()))
            }
        };
    }
    Err(PresenceError::ChannelUnavailable(
        "socket closed before join reply".into(),
    ))
}

#[async_trait]
impl PresenceProvider for RealtimeProvider {
    async fn subscribe(&self, room: &RoomId) -> Result<Subscription, PresenceError> {
        let url = self.config.ws_url();
        let topic = channel_topic(room);
        info!(url = %url.split('?').next().unwrap_or(""), topic = %topic, "Connecting to realtime server");

        let (ws, _) = timeout(self.config.connect_timeout, tokio_tungstenite::connect_async(&url))
            .await
            .map_err(|_| PresenceError::ChannelUnavailable("connect timed out".into()))?
            .map_err(|e| PresenceError::ChannelUnavailable(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let presence_key = self
            .identity
            .as_ref()
            .map(|i| i.user_id.clone())
            .unwrap_or_default();
        let join = PhoenixMessage::new(
            &topic,
            events::PHX_JOIN,
            join_payload(&presence_key, self.access_token()),
        );
        let join_ref = join.msg_ref.clone().unwrap_or_default();
        send_message(&mut write, &join)
            .await
            .map_err(PresenceError::ChannelUnavailable)?;

        let mut translator = ChannelTranslator::new(topic.as_str());
        let early = timeout(
            self.config.connect_timeout,
            await_join_reply(&mut read, &mut translator, &join_ref),
        )
        .await
        .map_err(|_| PresenceError::ChannelUnavailable("join timed out".into()))??;
        debug!(topic = %topic, early_events = early.len(), "Channel joined");

        if let Some(identity) = &self.identity {
            let track = PhoenixMessage::new(
                &topic,
                events::PRESENCE,
                serde_json::json!({
                    "type": "presence",
                    "event": "track",
                    "payload": identity.to_presence(),
                }),
            );
            if let Err(e) = send_message(&mut write, &track).await {
                warn!(topic = %topic, error = %e, "Presence track failed");
            }
        }

        let (feed, subscription) = Subscription::channel(FEED_CAPACITY);
        tokio::spawn(run_channel(
            write,
            read,
            translator,
            feed,
            self.config.heartbeat_interval(),
            early,
        ));
        Ok(subscription)
    }
}
