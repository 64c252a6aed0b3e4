//! Initialization protocol: resolving declarative remote references into
//! tracked files, with reactive readiness.

use std::sync::atomic::Ordering;

use uplink_core::config::InitialFiles;
use uplink_core::events::Event;
use uplink_core::models::TrackedFile;
use uplink_storage::RemoteFileInfo;

use crate::error::{ManagerResult, UploadError};
use crate::manager::UploadManager;

impl UploadManager {
    /// Kick off initial-file resolution. With no initial files configured
    /// the manager is ready immediately and nothing is spawned.
    pub(crate) fn spawn_initialization(&self) {
        match self.inner.config.initial_files.clone() {
            InitialFiles::None => {}
            InitialFiles::Keys(keys) => {
                let manager = self.clone();
                tokio::spawn(async move { manager.resolve_initial(keys).await });
            }
            InitialFiles::Watch(mut rx) => {
                let manager = self.clone();
                tokio::spawn(async move {
                    loop {
                        let keys = rx.borrow_and_update().clone();
                        if let Some(keys) = keys {
                            if !keys.is_empty() {
                                manager.resolve_initial(keys).await;
                                return;
                            }
                        }
                        if rx.changed().await.is_err() {
                            tracing::warn!("Initial-files source closed without a value");
                            manager.set_ready();
                            return;
                        }
                    }
                });
            }
        }
    }

    /// One-shot: the first resolution wins; re-entry from later reactive
    /// values is ignored.
    async fn resolve_initial(&self, keys: Vec<String>) {
        if self.inner.init_latch.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.resolve_remote_files(&keys).await {
            Ok(files) => {
                for file in &files {
                    self.inner.registry.push(file.clone());
                }
                self.inner.bus.emit(&Event::InitialFilesLoaded(files));
            }
            Err(error) => {
                tracing::warn!(error = %error, "Initial file resolution failed");
                self.inner
                    .bus
                    .emit(&Event::InitialFilesError(error.to_string()));
            }
        }
        // Readiness is set on failure too, so consumers never hang.
        self.set_ready();
    }

    /// Resolve keys in order through the adapter. All-or-nothing: a failure
    /// resolves nothing.
    async fn resolve_remote_files(&self, keys: &[String]) -> ManagerResult<Vec<TrackedFile>> {
        let valid: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|key| !key.trim().is_empty())
            .collect();
        if valid.is_empty() {
            return Ok(Vec::new());
        }
        let storage = self
            .inner
            .storage
            .clone()
            .ok_or(UploadError::NoStorageAdapter)?;

        let mut files = Vec::with_capacity(valid.len());
        for key in valid {
            let info = storage.get_remote_file(key).await?;
            files.push(remote_file_from(key, info));
        }
        Ok(files)
    }

    /// Bulk-resolve remote references, replacing the current registry.
    pub async fn initialize_existing_files(
        &self,
        keys: Vec<String>,
    ) -> ManagerResult<Vec<TrackedFile>> {
        let files = match self.resolve_remote_files(&keys).await {
            Ok(files) => files,
            Err(error) => {
                self.inner
                    .bus
                    .emit(&Event::InitialFilesError(error.to_string()));
                self.set_ready();
                return Err(error);
            }
        };

        self.inner.resources.drain();
        self.inner.registry.clear();
        self.clear_uploaded_latch();
        for file in &files {
            self.inner.registry.push(file.clone());
        }
        self.inner.bus.emit(&Event::InitialFilesLoaded(files.clone()));
        self.set_ready();
        Ok(files)
    }

    /// Non-replacing variant: dedups against tracked storage keys, respects
    /// `max_files` and emits `file:added` per admitted file. Keys that fail
    /// to resolve are skipped with a log.
    pub async fn append_existing_files(
        &self,
        keys: Vec<String>,
    ) -> ManagerResult<Vec<TrackedFile>> {
        let valid: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|key| !key.trim().is_empty())
            .collect();
        if valid.is_empty() {
            return Ok(Vec::new());
        }
        let storage = self
            .inner
            .storage
            .clone()
            .ok_or(UploadError::NoStorageAdapter)?;

        let mut admitted = Vec::new();
        for key in valid {
            let current = self.inner.registry.list();
            if current
                .iter()
                .any(|f| f.storage_key.as_deref() == Some(key))
            {
                tracing::debug!(key = %key, "Skipping already-tracked storage key");
                continue;
            }
            if let Some(max) = self.inner.config.max_files {
                if current.len() >= max {
                    tracing::warn!(max_files = max, "File limit reached; remaining keys ignored");
                    break;
                }
            }
            match storage.get_remote_file(key).await {
                Ok(info) => {
                    let file = remote_file_from(key, info);
                    self.inner.registry.push(file.clone());
                    self.inner.bus.emit(&Event::FileAdded(file.clone()));
                    admitted.push(file);
                }
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "Failed to resolve storage key");
                }
            }
        }
        Ok(admitted)
    }
}

fn remote_file_from(key: &str, info: RemoteFileInfo) -> TrackedFile {
    let mut file = TrackedFile::remote(key, info.size, info.mime_type, info.remote_url);
    file.preview = info.preview;
    file.upload_result = info.upload_result;
    file
}
