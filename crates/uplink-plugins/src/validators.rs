//! Built-in admission validators.
//!
//! Each validator is a [`Plugin`] with only a `validate` hook. Disabled
//! validators are simply not installed by the manager builder.

use async_trait::async_trait;
use serde_json::json;

use uplink_core::error::FileError;
use uplink_core::models::TrackedFile;

use crate::plugin::{Plugin, PluginContext};

/// Rejects admissions that would exceed the configured file count.
pub struct MaxFilesValidator {
    limit: usize,
}

impl MaxFilesValidator {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl Plugin for MaxFilesValidator {
    fn id(&self) -> &str {
        "max-files"
    }

    async fn validate(&self, _file: &TrackedFile, ctx: &PluginContext) -> Result<(), FileError> {
        // The candidate is not part of the snapshot yet. The capacity kind
        // tells admission the registry must not grow.
        if ctx.files.len() >= self.limit {
            return Err(FileError::capacity(
                format!("Maximum number of files exceeded (max: {})", self.limit),
                json!({ "limit": self.limit, "current": ctx.files.len() }),
            ));
        }
        Ok(())
    }
}

/// Rejects files larger than the configured byte limit.
pub struct MaxFileSizeValidator {
    limit: u64,
}

impl MaxFileSizeValidator {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl Plugin for MaxFileSizeValidator {
    fn id(&self) -> &str {
        "max-file-size"
    }

    async fn validate(&self, file: &TrackedFile, _ctx: &PluginContext) -> Result<(), FileError> {
        if file.size > self.limit {
            return Err(FileError::with_details(
                format!(
                    "File too large: {} bytes (max: {} bytes)",
                    file.size, self.limit
                ),
                json!({ "size": file.size, "limit": self.limit }),
            ));
        }
        Ok(())
    }
}

/// Rejects MIME types outside the configured set.
pub struct AllowedFileTypesValidator {
    allowed: Vec<String>,
}

impl AllowedFileTypesValidator {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Plugin for AllowedFileTypesValidator {
    fn id(&self) -> &str {
        "allowed-file-types"
    }

    async fn validate(&self, file: &TrackedFile, _ctx: &PluginContext) -> Result<(), FileError> {
        let mime = file.mime_type.to_lowercase();
        if !self.allowed.iter().any(|t| t == &mime) {
            return Err(FileError::with_details(
                format!(
                    "Invalid content type: {} (allowed: {})",
                    file.mime_type,
                    self.allowed.join(", ")
                ),
                json!({ "mime_type": file.mime_type, "allowed": self.allowed }),
            ));
        }
        Ok(())
    }
}

/// Rejects files matching an already-tracked name/size pair; when both sides
/// carry a modification time it must match too.
pub struct DuplicateFileValidator;

#[async_trait]
impl Plugin for DuplicateFileValidator {
    fn id(&self) -> &str {
        "duplicate-files"
    }

    async fn validate(&self, file: &TrackedFile, ctx: &PluginContext) -> Result<(), FileError> {
        let duplicate = ctx.files.iter().any(|other| {
            if other.name != file.name || other.size != file.size {
                return false;
            }
            match (other.last_modified, file.last_modified) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        });
        if duplicate {
            return Err(FileError::with_details(
                format!("Duplicate file: {}", file.name),
                json!({ "name": file.name, "size": file.size }),
            ));
        }
        Ok(())
    }
}
