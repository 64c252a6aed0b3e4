//! Storage key helpers shared by the bundled adapters.

use uplink_core::models::TrackedFile;

use crate::traits::{AdapterError, AdapterResult};

/// Reject keys that could escape a backend's namespace.
pub fn validate_key(key: &str) -> AdapterResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(AdapterError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Public URL for an object: `{base}/{key}` with a single separating slash.
pub fn public_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

/// Key a removal should address: the file's storage key, falling back to the
/// last path segment of its remote URL.
pub fn removal_key(file: &TrackedFile) -> Option<String> {
    if let Some(key) = &file.storage_key {
        return Some(key.clone());
    }
    file.remote_url
        .as_deref()
        .and_then(|url| url.rsplit('/').next())
        .map(str::to_string)
}
