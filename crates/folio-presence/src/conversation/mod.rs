//! Ephemeral author conversation: access gating, channel provisioning and
//! the ended/grace teardown.

mod actor;
mod controller;
mod types;

pub use controller::EphemeralConversationController;
pub use types::{ConversationConfig, ConversationFailure, ConversationState};
