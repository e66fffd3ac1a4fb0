//! Room presence channel: push transport session, poll fallback ladder, and
//! the coordinator that owns them for one enabled room at a time.

mod coordinator;
mod ladder;
mod session;
mod types;

pub use coordinator::PresenceChannelCoordinator;
pub use session::{SessionUpdate, TransportSession};
pub use types::CoordinatorConfig;
