//! Folio configuration system.
//!
//! Provides TOML-based configuration for the presence subsystem with
//! validation. All sections use serde defaults so partial configs work
//! out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use folio_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BackendConfig, ConversationConfig, FolioConfig, LogLevel, LoggingConfig, PresenceConfig,
    TransportConfig, CONFIG_SCHEMA_VERSION,
};

use folio_common::ConfigError;

/// Load config from the platform default path and validate it strictly.
///
/// Creates a commented default file if none exists.
pub fn load_config() -> Result<FolioConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &FolioConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
