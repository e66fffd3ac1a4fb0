//! Configuration schema types for Folio.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the presence subsystem ships with.

mod backend;
mod presence;
mod system;

pub use backend::*;
pub use presence::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Folio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    pub presence: PresenceConfig,
    pub transport: TransportConfig,
    pub conversation: ConversationConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}
