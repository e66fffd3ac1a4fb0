//! Phoenix Channels (v1 JSON) push provider for room presence.
//!
//! Each subscription owns one WebSocket: it joins `realtime:room:<id>`,
//! optionally tracks the local reader, and keeps the socket alive with
//! Phoenix heartbeats.

mod connection;
pub(crate) mod handler;
mod provider;
mod types;

pub use provider::RealtimeProvider;
pub use types::{PhoenixMessage, RealtimeConfig};
