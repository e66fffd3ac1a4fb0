//! Per-subscription socket task: heartbeat, reads, and the leave on close.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, trace, warn};

use crate::api::{ProviderEvent, ProviderFeed};
use crate::protocol::events;

use super::handler::ChannelTranslator;
use super::types::PhoenixMessage;

pub(crate) async fn send_message<W>(write: &mut W, msg: &PhoenixMessage) -> Result<(), String>
where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    write
        .send(WsMessage::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Drive one joined channel until the subscriber goes away or the socket
/// dies. `pending` holds events read while waiting for the join reply.
pub(crate) async fn run_channel<W, R>(
    mut write: W,
    mut read: R,
    mut translator: ChannelTranslator,
    feed: ProviderFeed,
    heartbeat_every: Duration,
    pending: Vec<ProviderEvent>,
) where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let topic = translator.topic().to_string();
    for event in pending {
        if !feed.send(event).await {
            leave(&mut write, &topic).await;
            return;
        }
    }

    let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);

    loop {
        tokio::select! {
            _ = feed.closed() => {
                leave(&mut write, &topic).await;
                return;
            }
            _ = heartbeat.tick() => {
                if let Err(e) = send_message(&mut write, &PhoenixMessage::heartbeat()).await {
                    warn!(topic = %topic, error = %e, "Heartbeat send failed");
                    feed.send(ProviderEvent::Lost(format!("heartbeat failed: {e}"))).await;
                    return;
                }
                trace!(topic = %topic, "Heartbeat sent");
            }
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let Ok(msg) = serde_json::from_str::<PhoenixMessage>(&text) else {
                        debug!(text = %text, "Unrecognized message from realtime server");
                        continue;
                    };
                    let mut lost = false;
                    for event in translator.translate(&msg) {
                        lost |= matches!(event, ProviderEvent::Lost(_));
                        if !feed.send(event).await {
                            leave(&mut write, &topic).await;
                            return;
                        }
                    }
                    if lost {
                        return;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!(topic = %topic, "Realtime server closed connection");
                    feed.send(ProviderEvent::Lost("socket closed".into())).await;
                    return;
                }
                Some(Err(e)) => {
                    warn!(topic = %topic, error = %e, "WebSocket error");
                    feed.send(ProviderEvent::Lost(format!("socket error: {e}"))).await;
                    return;
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn leave<W>(write: &mut W, topic: &str)
where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
{
    let msg = PhoenixMessage::new(topic, events::PHX_LEAVE, serde_json::json!({}));
    if let Err(e) = send_message(write, &msg).await {
        debug!(topic = %topic, error = %e, "Leave not delivered");
    }
    let _ = write.send(WsMessage::Close(None)).await;
    debug!(topic = %topic, "Left realtime channel");
}
