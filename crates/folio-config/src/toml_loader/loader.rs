//! Reading `config.toml`, with secrets optionally taken from the environment.

use std::path::Path;

use folio_common::ConfigError;
use tracing::{debug, info, warn};

use crate::schema::FolioConfig;
use crate::validation;

use super::paths::{create_default_config, default_config_path};

/// Overrides `backend.api_key` when set.
pub const API_KEY_ENV: &str = "FOLIO_API_KEY";
/// Overrides `backend.access_token` when set.
pub const ACCESS_TOKEN_ENV: &str = "FOLIO_ACCESS_TOKEN";

/// Copy backend secrets from `lookup` into `config`. Empty values are ignored.
pub(crate) fn apply_secret_overrides(
    config: &mut FolioConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    if let Some(key) = present(API_KEY_ENV) {
        debug!(var = API_KEY_ENV, "API key taken from environment");
        config.backend.api_key = key;
    }
    if let Some(token) = present(ACCESS_TOKEN_ENV) {
        debug!(var = ACCESS_TOKEN_ENV, "Access token taken from environment");
        config.backend.access_token = Some(token);
    }
}

fn from_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load `path`, filling missing keys with defaults.
///
/// Range problems are only logged here; `load_config` is the strict entry
/// point.
pub fn load_from_path(path: &Path) -> Result<FolioConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    let mut config: FolioConfig = toml::from_str(&content).map_err(|e| {
        ConfigError::ParseError(format!("{}: {e}", path.display()))
    })?;
    apply_secret_overrides(&mut config, from_env);

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "Config has out-of-range values");
    }
    info!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Load from the platform config directory (`~/.config/folio/config.toml`
/// on Linux), writing a commented default file on first run.
pub fn load_default() -> Result<FolioConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            let mut config = FolioConfig::default();
            apply_secret_overrides(&mut config, from_env);
            Ok(config)
        }
        other => other,
    }
}
