//! Local filesystem storage adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use uplink_core::mime;
use uplink_core::models::TrackedFile;

use crate::keys;
use crate::traits::{
    AdapterError, AdapterResult, ProgressReporter, RemoteFileInfo, StorageAdapter, UploadOutcome,
};

/// Adapter that writes objects under a base directory and serves them from a
/// base URL. Keys are relative paths; the uploaded file's id by default.
pub struct LocalDiskAdapter {
    base_path: PathBuf,
    base_url: String,
}

impl LocalDiskAdapter {
    /// # Arguments
    /// * `base_path` - Root directory for stored objects
    /// * `base_url` - Base URL the objects are served from
    pub async fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> AdapterResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            AdapterError::Backend(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(Self {
            base_path,
            base_url: base_url.into(),
        })
    }

    /// Converts a storage key to a filesystem path, rejecting traversal.
    fn key_to_path(&self, storage_key: &str) -> AdapterResult<PathBuf> {
        keys::validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    fn url_for(&self, key: &str) -> String {
        keys::public_url(&self.base_url, key)
    }

    async fn write_object(&self, path: &Path, key: &str, data: &[u8]) -> AdapterResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), key = %key, error = %e, "Local storage create failed");
            AdapterError::UploadFailed(format!("Failed to create {}: {}", path.display(), e))
        })?;
        file.write_all(data).await.map_err(|e| {
            tracing::error!(path = %path.display(), key = %key, error = %e, "Local storage write failed");
            AdapterError::UploadFailed(format!("Failed to write {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            tracing::error!(path = %path.display(), key = %key, error = %e, "Local storage sync failed");
            AdapterError::UploadFailed(format!("Failed to sync {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for LocalDiskAdapter {
    fn id(&self) -> &str {
        "local-storage"
    }

    async fn upload(
        &self,
        file: &TrackedFile,
        progress: &ProgressReporter,
    ) -> AdapterResult<UploadOutcome> {
        let data = file
            .data
            .as_ref()
            .ok_or_else(|| AdapterError::UploadFailed("file has no local data".to_string()))?;

        let key = file.id.clone();
        let path = self.key_to_path(&key)?;
        self.write_object(&path, &key, data).await?;
        progress.report(100);

        tracing::info!(key = %key, size = data.len(), "Stored object on local disk");
        Ok(UploadOutcome::new(self.url_for(&key)).with_storage_key(key))
    }

    async fn get_remote_file(&self, storage_key: &str) -> AdapterResult<RemoteFileInfo> {
        let path = self.key_to_path(storage_key)?;
        let metadata = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AdapterError::NotFound(storage_key.to_string())
            } else {
                AdapterError::Io(e)
            }
        })?;

        let mime_type = storage_key
            .rsplit('.')
            .next()
            .and_then(mime::mime_for_extension)
            .unwrap_or("application/octet-stream")
            .to_string();

        Ok(RemoteFileInfo {
            size: metadata.len(),
            mime_type,
            remote_url: self.url_for(storage_key),
            preview: None,
            upload_result: None,
        })
    }

    async fn remove(&self, file: &TrackedFile) -> AdapterResult<()> {
        let Some(key) = keys::removal_key(file) else {
            return Ok(());
        };
        let path = self.key_to_path(&key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key = %key, "Removed object from local disk");
                Ok(())
            }
            // Idempotent delete.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Local storage remove failed");
                Err(AdapterError::RemoveFailed(format!("{}: {}", key, e)))
            }
        }
    }

    async fn upload_blob(
        &self,
        key: &str,
        _content_type: &str,
        data: Bytes,
    ) -> AdapterResult<UploadOutcome> {
        let path = self.key_to_path(key)?;
        self.write_object(&path, key, &data).await?;
        Ok(UploadOutcome::new(self.url_for(key)).with_storage_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplink_core::models::FileInput;

    async fn adapter() -> (tempfile::TempDir, LocalDiskAdapter) {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalDiskAdapter::new(dir.path(), "http://localhost/media")
            .await
            .unwrap();
        (dir, adapter)
    }

    fn local_file(id: &str, data: &'static [u8]) -> TrackedFile {
        let input = FileInput::new(id, data);
        TrackedFile::local(id.to_string(), &input)
    }

    #[tokio::test]
    async fn test_upload_get_remove_round_trip() {
        let (_dir, adapter) = adapter().await;
        let file = local_file("1-abc.png", b"pngbytes");

        let outcome = adapter.upload(&file, &ProgressReporter::noop()).await.unwrap();
        let key = outcome.storage_key.clone().unwrap();
        assert_eq!(outcome.url, "http://localhost/media/1-abc.png");

        let info = adapter.get_remote_file(&key).await.unwrap();
        assert_eq!(info.size, 8);
        assert_eq!(info.mime_type, "image/png");

        let mut stored = file.clone();
        stored.storage_key = Some(key.clone());
        adapter.remove(&stored).await.unwrap();
        assert!(matches!(
            adapter.get_remote_file(&key).await,
            Err(AdapterError::NotFound(_))
        ));
        // Idempotent.
        adapter.remove(&stored).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let (_dir, adapter) = adapter().await;
        assert!(matches!(
            adapter.get_remote_file("../etc/passwd").await,
            Err(AdapterError::InvalidKey(_))
        ));
        assert!(matches!(
            adapter.get_remote_file("/abs/path.png").await,
            Err(AdapterError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_blob_creates_parent_dirs() {
        let (dir, adapter) = adapter().await;
        adapter
            .upload_blob("thumbs/a_thumb.png", "image/png", Bytes::from_static(b"t"))
            .await
            .unwrap();
        assert!(dir.path().join("thumbs/a_thumb.png").exists());
    }
}
