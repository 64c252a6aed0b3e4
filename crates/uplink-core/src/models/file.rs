use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::FileError;
use crate::mime;

/// Where a tracked file's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSource {
    /// Bytes owned by the manager.
    Local,
    /// Bytes held by remote storage; only metadata is tracked.
    Storage,
}

/// Per-file lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Waiting,
    Uploading,
    Complete,
    Error,
}

/// Upload progress, 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub percentage: u8,
}

impl Progress {
    pub fn new(percentage: u8) -> Self {
        Self {
            percentage: percentage.min(100),
        }
    }

    pub const fn complete() -> Self {
        Self { percentage: 100 }
    }
}

/// Location of an uploaded thumbnail artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRef {
    pub url: String,
    pub storage_key: String,
}

/// A file the manager is aware of, local or remote.
///
/// The `source` discriminator decides which fields are live: `Local` files
/// own `data`; `Storage` files carry no bytes and require `remote_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Stable identifier, unique within a manager instance.
    pub id: String,
    /// Original display filename.
    pub name: String,
    /// Byte length.
    pub size: u64,
    /// Media type.
    pub mime_type: String,
    pub source: FileSource,
    pub status: FileStatus,
    pub progress: Progress,
    /// Owned bytes; `Some` exactly when `source` is `Local`.
    #[serde(skip)]
    pub data: Option<Bytes>,
    /// Data URL or object URL for UI preview.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thumbnail: Option<ThumbnailRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub storage_key: Option<String>,
    /// Opaque adapter result recorded on successful upload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upload_result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<FileError>,
    /// Plugin extension data.
    #[serde(default)]
    pub meta: serde_json::Map<String, JsonValue>,
    /// Source file modification time, when the input carried one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl TrackedFile {
    /// Build a local file in `waiting` state from an admission input.
    pub fn local(id: String, input: &FileInput) -> Self {
        Self {
            id,
            name: input.name.clone(),
            size: input.data.len() as u64,
            mime_type: input.resolved_mime(),
            source: FileSource::Local,
            status: FileStatus::Waiting,
            progress: Progress::default(),
            data: Some(input.data.clone()),
            preview: None,
            thumbnail: None,
            remote_url: None,
            storage_key: None,
            upload_result: None,
            error: None,
            meta: serde_json::Map::new(),
            last_modified: input.last_modified,
        }
    }

    /// Build a remote file, already complete, from resolved storage metadata.
    pub fn remote(
        storage_key: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        remote_url: impl Into<String>,
    ) -> Self {
        let storage_key = storage_key.into();
        let name = storage_key
            .rsplit('/')
            .next()
            .unwrap_or(storage_key.as_str())
            .to_string();
        Self {
            id: name.clone(),
            name,
            size,
            mime_type: mime_type.into(),
            source: FileSource::Storage,
            status: FileStatus::Complete,
            progress: Progress::complete(),
            data: None,
            preview: None,
            thumbnail: None,
            remote_url: Some(remote_url.into()),
            storage_key: Some(storage_key),
            upload_result: None,
            error: None,
            meta: serde_json::Map::new(),
            last_modified: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.source == FileSource::Local
    }

    /// Extension of the file id (lowercase, without the dot).
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.id)
    }

    /// Mark the file failed, attaching the error.
    pub fn set_error(&mut self, error: FileError) {
        self.status = FileStatus::Error;
        self.error = Some(error);
    }

    /// Swap the extension of the id, for format-changing transforms.
    /// Ids without an extension are left untouched.
    pub fn rewrite_id_extension(&mut self, new_extension: &str) {
        if let Some(stem) = self.id.rsplit_once('.').map(|(stem, _)| stem) {
            self.id = format!("{}.{}", stem, new_extension);
        }
    }
}

/// User-provided source for a file admission.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    pub data: Bytes,
    pub mime_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mime_type: None,
            last_modified: None,
        }
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    /// Explicit MIME type, or one derived from the name's extension, or the
    /// generic fallback.
    pub fn resolved_mime(&self) -> String {
        if let Some(mime_type) = &self.mime_type {
            return mime_type.clone();
        }
        extension_of(&self.name)
            .and_then(|ext| mime::mime_for_extension(&ext))
            .unwrap_or("application/octet-stream")
            .to_string()
    }
}

/// Derive a unique file id from a source name: `{unix_millis}-{rand6}.{ext}`.
/// Fails when the name carries no extension.
pub fn derive_file_id(name: &str) -> Result<String, FileError> {
    let ext = extension_of(name).ok_or_else(|| {
        FileError::with_details(
            format!("Invalid file name: {} (missing extension)", name),
            serde_json::json!({ "name": name }),
        )
    })?;
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    Ok(format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase(),
        ext
    ))
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext.to_lowercase())
}
