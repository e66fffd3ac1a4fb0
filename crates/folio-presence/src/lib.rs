//! Presence-driven room membership and ephemeral author conversations.
//!
//! Tracks who is currently reading a book together, degrades from push to
//! polling to offline when the realtime transport misbehaves, and opens a
//! short-lived one-to-one conversation channel while the book's author is
//! in the room.

pub mod api;
pub mod conversation;
pub mod http;
pub mod identity;
pub mod membership;
pub mod presence;
pub mod presentation;
pub mod protocol;
pub mod realtime;
pub mod roster;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{
    AccessGrant, ChannelTicket, ChatClient, ConversationBackend, ConversationChannel,
    PresenceProvider, ProviderEvent, ProviderFeed, RoomApi, Subscription,
};
pub use conversation::{
    ConversationConfig, ConversationFailure, ConversationState, EphemeralConversationController,
};
pub use http::{HttpBackend, HttpConfig};
pub use identity::Identity;
pub use membership::{MembershipConfig, RoomMembership, RoomMembershipController};
pub use presence::{CoordinatorConfig, PresenceChannelCoordinator, SessionUpdate, TransportSession};
pub use presentation::{
    author_of, connection_indicator, present_roster, ConnectionIndicator, IndicatorTone, RosterView,
};
pub use realtime::{RealtimeConfig, RealtimeProvider};
pub use roster::{ConnectionMode, PresenceMember, PresenceState, RosterDelta, RosterSnapshot};
