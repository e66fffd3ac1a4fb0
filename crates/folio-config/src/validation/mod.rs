//! Full configuration validation.
//!
//! Validates numeric ranges and endpoint formats. Each domain has its own
//! submodule; this orchestrator calls them all and collects errors into a
//! single `ConfigError`.

mod backend;
mod helpers;
mod presence;


use crate::schema::FolioConfig;
use folio_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &FolioConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    presence::validate_presence(&mut errors, config);
    presence::validate_transport(&mut errors, config);
    presence::validate_conversation(&mut errors, config);
    backend::validate_backend(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
