//! Storage abstraction trait
//!
//! This module defines the port that all storage backends implement, plus the
//! progress-reporting handle handed to `upload`.

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use uplink_core::models::TrackedFile;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Remove failed: {0}")]
    RemoveFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Successful upload result.
///
/// `url` is the publicly reachable location; `storage_key` is the internal
/// identifier that must round-trip through [`StorageAdapter::get_remote_file`]
/// and [`StorageAdapter::remove`]. `extra` carries adapter-specific fields
/// and is recorded opaquely on the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub storage_key: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl UploadOutcome {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            storage_key: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }
}

/// Metadata resolved for a previously stored object; the inverse of `upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub size: u64,
    pub mime_type: String,
    pub remote_url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upload_result: Option<JsonValue>,
}

/// Progress handle passed to `upload`.
///
/// Clamps to 0-100 and enforces monotonic non-decrease within the attempt; a
/// late lower report is raised to the current high-water mark rather than
/// moving backwards. Adapters must report 100 when the transfer completes.
pub struct ProgressReporter {
    callback: Box<dyn Fn(u8) + Send + Sync>,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            last: AtomicU8::new(0),
        }
    }

    /// Reporter that discards updates, for adapter paths with no observer.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, percentage: u8) {
        let clamped = percentage.min(100);
        let previous = self.last.fetch_max(clamped, Ordering::SeqCst);
        (self.callback)(clamped.max(previous));
    }

    /// High-water mark reported so far.
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Port implemented by storage backends.
///
/// The manager treats each call as atomic; retries, chunking and timeouts are
/// adapter-internal concerns. Contracts:
///
/// 1. Removing a non-existent object succeeds silently.
/// 2. The `storage_key` returned by `upload` is accepted by
///    `get_remote_file` and `remove` to refer to the same object.
/// 3. Successive progress reports are non-decreasing.
/// 4. Failures are raised as errors, never swallowed.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Identifier used for event scoping and logs.
    fn id(&self) -> &str {
        "storage"
    }

    /// Transfer a local file's bytes to the backend.
    async fn upload(
        &self,
        file: &TrackedFile,
        progress: &ProgressReporter,
    ) -> AdapterResult<UploadOutcome>;

    /// Resolve metadata for a previously stored object.
    async fn get_remote_file(&self, storage_key: &str) -> AdapterResult<RemoteFileInfo>;

    /// Delete the referenced object. Implementations may address it through
    /// `file.storage_key` or `file.remote_url`; the manager never calls this
    /// for a file lacking both.
    async fn remove(&self, file: &TrackedFile) -> AdapterResult<()>;

    /// Standalone upload for plugin-originated artifacts (e.g. thumbnails).
    async fn upload_blob(
        &self,
        _key: &str,
        _content_type: &str,
        _data: Bytes,
    ) -> AdapterResult<UploadOutcome> {
        Err(AdapterError::Unsupported(
            "standalone blob upload".to_string(),
        ))
    }
}
