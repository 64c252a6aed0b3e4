//! Error types module
//!
//! The per-file error carried on a [`TrackedFile`](crate::models::TrackedFile)
//! and emitted with `file:error` events. Crate-level operational errors live
//! with the crates that raise them (`AdapterError` in `uplink-storage`,
//! `UploadError` in `uplink`).

use serde::{Deserialize, Serialize};

/// Classification of a file error. `Capacity` marks rejections where
/// admitting the file would exceed a whole-manager limit, so the registry
/// must not grow; everything else concerns the file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileErrorKind {
    #[default]
    File,
    Capacity,
}

/// Failure attached to a file: a human-readable message plus optional
/// machine-readable details (limits, offending values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct FileError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub kind: FileErrorKind,
}

impl FileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            kind: FileErrorKind::File,
        }
    }

    pub fn with_details(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            details: Some(details),
            kind: FileErrorKind::File,
        }
    }

    /// A capacity rejection; admission leaves the registry untouched.
    pub fn capacity(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            details: Some(details),
            kind: FileErrorKind::Capacity,
        }
    }

    pub fn is_capacity(&self) -> bool {
        self.kind == FileErrorKind::Capacity
    }
}

impl From<String> for FileError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for FileError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
