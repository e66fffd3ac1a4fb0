pub mod errors;
pub mod id;

pub use errors::{ConfigError, FolioError, PresenceError};
pub use id::{new_correlation_id, new_id, RoomId};

pub type Result<T> = std::result::Result<T, FolioError>;
