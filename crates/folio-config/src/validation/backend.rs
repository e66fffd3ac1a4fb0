//! Endpoint format validation.

use crate::schema::FolioConfig;

pub(crate) fn validate_backend(errors: &mut Vec<String>, config: &FolioConfig) {
    let b = &config.backend;
    if !(b.api_url.starts_with("http://") || b.api_url.starts_with("https://")) {
        errors.push(format!(
            "backend.api_url = {:?} must start with http:// or https://",
            b.api_url
        ));
    }
    if !(b.realtime_url.starts_with("ws://") || b.realtime_url.starts_with("wss://")) {
        errors.push(format!(
            "backend.realtime_url = {:?} must start with ws:// or wss://",
            b.realtime_url
        ));
    }
}
