//! In-memory storage adapter for tests, demos and single-process use.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use uplink_core::models::TrackedFile;

use crate::keys;
use crate::traits::{
    AdapterError, AdapterResult, ProgressReporter, RemoteFileInfo, StorageAdapter, UploadOutcome,
};

struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Adapter that keeps objects in a process-local map and synthesizes
/// `{base_url}/{key}` URLs. Keys are the uploaded file's id.
pub struct MemoryAdapter {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    fn url_for(&self, key: &str) -> String {
        keys::public_url(&self.base_url, key)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn id(&self) -> &str {
        "memory-storage"
    }

    async fn upload(
        &self,
        file: &TrackedFile,
        progress: &ProgressReporter,
    ) -> AdapterResult<UploadOutcome> {
        let data = file
            .data
            .clone()
            .ok_or_else(|| AdapterError::UploadFailed("file has no local data".to_string()))?;

        let key = file.id.clone();
        progress.report(50);
        self.objects.write().await.insert(
            key.clone(),
            StoredObject {
                data,
                content_type: file.mime_type.clone(),
            },
        );
        progress.report(100);

        Ok(UploadOutcome::new(self.url_for(&key)).with_storage_key(key))
    }

    async fn get_remote_file(&self, storage_key: &str) -> AdapterResult<RemoteFileInfo> {
        let objects = self.objects.read().await;
        let object = objects
            .get(storage_key)
            .ok_or_else(|| AdapterError::NotFound(storage_key.to_string()))?;
        Ok(RemoteFileInfo {
            size: object.data.len() as u64,
            mime_type: object.content_type.clone(),
            remote_url: self.url_for(storage_key),
            preview: None,
            upload_result: None,
        })
    }

    async fn remove(&self, file: &TrackedFile) -> AdapterResult<()> {
        if let Some(key) = keys::removal_key(file) {
            // Idempotent: removing an absent object is fine.
            self.objects.write().await.remove(&key);
        }
        Ok(())
    }

    async fn upload_blob(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> AdapterResult<UploadOutcome> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(UploadOutcome::new(self.url_for(key)).with_storage_key(key))
    }
}
