//! Upload manager facade and file operations.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde_json::Value as JsonValue;
use tokio::sync::watch;

use uplink_core::bus::{EventBus, HandlerId};
use uplink_core::config::ManagerConfig;
use uplink_core::error::FileError;
use uplink_core::events::Event;
use uplink_core::models::{derive_file_id, FileInput, FileStatus, TrackedFile};
use uplink_plugins::{Plugin, PluginRunner, StageEnv};
use uplink_storage::StorageAdapter;

use crate::error::{ManagerResult, UploadError};
use crate::registry::{FileRegistry, ManagerStatus};
use crate::resources::ObjectUrlTracker;

/// Files above this size get a warning log when their bytes are materialized.
const SIZE_WARNING_BYTES: u64 = 100 * 1024 * 1024;
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Byte stream over a tracked file's contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UploadError>> + Send>>;

/// Storage-deletion policy for [`UploadManager::remove_file_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteFromStorage {
    /// Delete from storage whenever the file has a remote presence.
    #[default]
    Always,
    /// Never touch storage.
    Never,
    /// Delete from storage only for files this manager uploaded; files that
    /// entered as remote references are only dropped from the registry.
    LocalOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub delete_from_storage: DeleteFromStorage,
}

/// Shallow patch applied by [`UploadManager::update_file`]; `meta` entries
/// merge key-wise. No bus events are emitted.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub name: Option<String>,
    pub preview: Option<String>,
    pub remote_url: Option<String>,
    pub storage_key: Option<String>,
    pub status: Option<FileStatus>,
    pub error: Option<FileError>,
    pub meta: Option<serde_json::Map<String, JsonValue>>,
}

pub(crate) struct ManagerInner {
    pub(crate) config: Arc<ManagerConfig>,
    pub(crate) bus: EventBus,
    pub(crate) registry: FileRegistry,
    pub(crate) resources: ObjectUrlTracker,
    pub(crate) runner: PluginRunner,
    pub(crate) storage: Option<Arc<dyn StorageAdapter>>,
    pub(crate) ready_tx: watch::Sender<bool>,
    pub(crate) uploaded_latch: AtomicBool,
    pub(crate) init_latch: AtomicBool,
    pub(crate) upload_gate: tokio::sync::Mutex<()>,
    pub(crate) http: reqwest::Client,
}

/// Reactive, plugin-driven upload manager.
///
/// Cheap to clone; clones share the same state. All state is in-memory for
/// the lifetime of the manager.
#[derive(Clone)]
pub struct UploadManager {
    pub(crate) inner: Arc<ManagerInner>,
}

impl UploadManager {
    /// Builder with storage adapter and extra plugins; see
    /// [`UploadManagerBuilder`](crate::builder::UploadManagerBuilder).
    pub fn builder() -> crate::builder::UploadManagerBuilder {
        crate::builder::UploadManagerBuilder::new()
    }

    /// Construct from configuration alone (no storage adapter, no extra
    /// plugins).
    pub fn new(config: ManagerConfig) -> Self {
        Self::builder().config(config).build()
    }

    // --- Observables ------------------------------------------------------

    /// Watch the tracked file sequence.
    pub fn files(&self) -> watch::Receiver<Vec<TrackedFile>> {
        self.inner.registry.watch_files()
    }

    /// Current snapshot of the tracked file sequence.
    pub fn files_snapshot(&self) -> Vec<TrackedFile> {
        self.inner.registry.list()
    }

    /// Watch the derived mean progress percentage.
    pub fn total_progress(&self) -> watch::Receiver<u8> {
        self.inner.registry.watch_progress()
    }

    /// Watch the aggregate status.
    pub fn status(&self) -> watch::Receiver<ManagerStatus> {
        self.inner.registry.watch_status()
    }

    /// Number of object URLs currently tracked; zero after `reset` or
    /// teardown.
    pub fn tracked_url_count(&self) -> usize {
        self.inner.resources.len()
    }

    /// Whether deferred initialization has settled.
    pub fn is_ready(&self) -> bool {
        *self.inner.ready_tx.subscribe().borrow()
    }

    /// Watch the readiness flag.
    pub fn watch_ready(&self) -> watch::Receiver<bool> {
        self.inner.ready_tx.subscribe()
    }

    // --- Events and plugins -----------------------------------------------

    /// Subscribe to a named event (canonical or plugin-scoped).
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.bus.on(event, handler)
    }

    /// Remove a subscription made with [`on`](Self::on).
    pub fn off(&self, id: HandlerId) -> bool {
        self.inner.bus.off(id)
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Append a plugin; takes effect on subsequent file operations.
    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) {
        self.inner.runner.register(plugin);
    }

    // --- Admission --------------------------------------------------------

    /// Admit a file: derive its id, run validators and preprocess hooks,
    /// enter it into the registry and emit `file:added`.
    ///
    /// A validator rejection emits `file:error` and returns the validation
    /// error; unless the error carries the capacity kind (see
    /// [`FileError::is_capacity`]), the file is appended with `Error` status
    /// so the UI can show it. A preprocess hook failure also admits the file
    /// with `Error` status but is not surfaced as an `Err` (the hook's
    /// `file:error` event carries it).
    pub async fn add_file(&self, input: FileInput) -> ManagerResult<TrackedFile> {
        let id = derive_file_id(&input.name)
            .map_err(|_| UploadError::InvalidFileName(input.name.clone()))?;
        let file = TrackedFile::local(id, &input);
        let env = self.stage_env();

        if let Err(failure) = self.inner.runner.run_validate(&file, &env).await {
            let mut rejected = failure.file;
            rejected.set_error(failure.error.clone());
            // Capacity rejections must not grow the registry past the limit;
            // per-file rejections stay visible as errored entries.
            if !failure.error.is_capacity() {
                self.inner.registry.push(rejected.clone());
                self.clear_uploaded_latch();
            }
            self.inner.bus.emit(&Event::FileError {
                file: rejected,
                error: failure.error.clone(),
            });
            return Err(UploadError::Validation(failure.error));
        }

        let admitted = match self.inner.runner.run_preprocess(file, &env).await {
            Ok(ready) => ready,
            Err(failure) => {
                // The runner already emitted file:error for the hook failure.
                let mut errored = failure.file;
                errored.set_error(failure.error);
                errored
            }
        };

        self.inner.registry.push(admitted.clone());
        self.clear_uploaded_latch();
        self.inner.bus.emit(&Event::FileAdded(admitted.clone()));

        if self.inner.config.auto_upload && admitted.status == FileStatus::Waiting {
            self.schedule_upload();
        }
        Ok(admitted)
    }

    /// Admit a batch; individual failures never abort the batch. Returns the
    /// files admitted in `waiting` state.
    pub async fn add_files(&self, inputs: Vec<FileInput>) -> Vec<TrackedFile> {
        let mut admitted = Vec::new();
        for input in inputs {
            match self.add_file(input).await {
                Ok(file) if file.status == FileStatus::Waiting => admitted.push(file),
                Ok(_) => {}
                Err(error) => {
                    tracing::debug!(error = %error, "File rejected during batch add");
                }
            }
        }
        admitted
    }

    // --- Removal ----------------------------------------------------------

    /// Remove a file with the default deletion policy. No-op on unknown ids.
    pub async fn remove_file(&self, id: &str) -> Option<TrackedFile> {
        self.remove_file_with(id, RemoveOptions::default()).await
    }

    /// Remove a file, deciding storage deletion per the options. Adapter
    /// failures are logged and never block local removal.
    pub async fn remove_file_with(&self, id: &str, opts: RemoveOptions) -> Option<TrackedFile> {
        let file = self.inner.registry.by_id(id)?;

        let has_remote = file.remote_url.is_some() || file.storage_key.is_some();
        let delete = match opts.delete_from_storage {
            DeleteFromStorage::Always => has_remote,
            DeleteFromStorage::Never => false,
            DeleteFromStorage::LocalOnly => file.is_local() && file.storage_key.is_some(),
        };
        if delete {
            if let Some(storage) = &self.inner.storage {
                if let Err(error) = storage.remove(&file).await {
                    tracing::warn!(
                        file_id = %id,
                        error = %error,
                        "Storage remove failed; removing locally anyway"
                    );
                }
            }
        }

        self.inner.resources.release(id);
        let removed = self.inner.registry.remove(id)?;
        self.inner.bus.emit(&Event::FileRemoved(removed.clone()));
        Some(removed)
    }

    /// Local-only bulk removal; storage is never contacted.
    pub fn remove_files(&self, ids: &[&str]) -> Vec<TrackedFile> {
        let mut removed = Vec::new();
        for id in ids {
            self.inner.resources.release(id);
            if let Some(file) = self.inner.registry.remove(id) {
                self.inner.bus.emit(&Event::FileRemoved(file.clone()));
                removed.push(file);
            }
        }
        removed
    }

    /// Drop every tracked file locally, emitting `file:removed` per file.
    pub fn clear_files(&self) -> Vec<TrackedFile> {
        let removed = self.inner.registry.clear();
        for file in &removed {
            self.inner.resources.release(&file.id);
            self.inner.bus.emit(&Event::FileRemoved(file.clone()));
        }
        removed
    }

    /// Drop all state silently: no per-file events.
    pub fn reset(&self) {
        self.inner.resources.drain();
        self.inner.registry.clear();
        self.clear_uploaded_latch();
    }

    // --- Ordering ---------------------------------------------------------

    /// Splice a file to a new position; emits `files:reorder`. Out-of-bounds
    /// or equal indices are a logged no-op.
    pub fn reorder_file(&self, old_index: usize, new_index: usize) {
        if !self.inner.registry.move_file(old_index, new_index) {
            tracing::debug!(old_index, new_index, "Ignoring no-op reorder");
            return;
        }
        self.inner.bus.emit(&Event::FilesReorder {
            old_index,
            new_index,
        });
    }

    // --- Data access ------------------------------------------------------

    pub fn get_file(&self, id: &str) -> ManagerResult<TrackedFile> {
        self.inner
            .registry
            .by_id(id)
            .ok_or_else(|| UploadError::NotFound(id.to_string()))
    }

    /// The file's bytes: local data directly, remote files fetched over HTTP.
    pub async fn get_file_data(&self, id: &str) -> ManagerResult<Bytes> {
        let file = self.get_file(id)?;
        if file.size > SIZE_WARNING_BYTES {
            tracing::warn!(
                file_id = %id,
                size = file.size,
                "Materializing a very large file in memory"
            );
        }
        match file.data {
            Some(data) => Ok(data),
            None => {
                let url = self.remote_url_of(&file)?;
                let response = self
                    .inner
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| UploadError::Fetch(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(UploadError::Fetch(format!(
                        "{} fetching {}",
                        response.status(),
                        url
                    )));
                }
                response
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Fetch(e.to_string()))
            }
        }
    }

    /// A URL for the file: a tracked object URL for local files, the remote
    /// URL otherwise.
    pub fn get_file_url(&self, id: &str) -> ManagerResult<String> {
        let file = self.get_file(id)?;
        match file.data {
            Some(data) => Ok(self.inner.resources.url_for(&file.id, data)),
            None => self.remote_url_of(&file),
        }
    }

    /// Stream the file's bytes: chunked local data, or the HTTP body stream
    /// for remote files.
    pub async fn get_file_stream(&self, id: &str) -> ManagerResult<ByteStream> {
        let file = self.get_file(id)?;
        match file.data {
            Some(data) => {
                let chunks: Vec<ManagerResult<Bytes>> = data
                    .chunks(STREAM_CHUNK_BYTES)
                    .map(|chunk| Ok(data.slice_ref(chunk)))
                    .collect();
                Ok(Box::pin(futures::stream::iter(chunks)))
            }
            None => {
                let url = self.remote_url_of(&file)?;
                let response = self
                    .inner
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| UploadError::Fetch(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(UploadError::Fetch(format!(
                        "{} fetching {}",
                        response.status(),
                        url
                    )));
                }
                Ok(Box::pin(
                    response
                        .bytes_stream()
                        .map_err(|e| UploadError::Fetch(e.to_string())),
                ))
            }
        }
    }

    // --- Replacement and patching -----------------------------------------

    /// Swap a file's bytes for new ones, sending it back to `waiting` with
    /// its id preserved and remote state cleared. Re-runs preprocess, emits
    /// `file:replaced` then `file:added`, and optionally schedules an upload
    /// (`auto_upload` overrides the configured default).
    pub async fn replace_file_data(
        &self,
        id: &str,
        data: impl Into<Bytes>,
        name: Option<String>,
        auto_upload: Option<bool>,
    ) -> ManagerResult<TrackedFile> {
        let existing = self.get_file(id)?;
        self.inner.resources.release(id);

        let input = FileInput {
            name: name.unwrap_or(existing.name),
            data: data.into(),
            mime_type: None,
            last_modified: None,
        };
        let fresh = TrackedFile::local(existing.id, &input);

        let env = self.stage_env();
        let replacement = match self.inner.runner.run_preprocess(fresh, &env).await {
            Ok(file) => file,
            Err(failure) => {
                let mut errored = failure.file;
                errored.set_error(failure.error);
                errored
            }
        };

        self.inner
            .registry
            .replace_by_id(id, replacement.clone())
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;
        self.clear_uploaded_latch();
        self.inner.bus.emit(&Event::FileReplaced(replacement.clone()));
        self.inner.bus.emit(&Event::FileAdded(replacement.clone()));

        if auto_upload.unwrap_or(self.inner.config.auto_upload)
            && replacement.status == FileStatus::Waiting
        {
            self.schedule_upload();
        }
        Ok(replacement)
    }

    /// Shallow-merge a patch into a file. No bus events; watch subscribers
    /// still observe the change.
    pub fn update_file(&self, id: &str, patch: FilePatch) -> ManagerResult<TrackedFile> {
        self.inner
            .registry
            .update(id, |file| {
                if let Some(name) = patch.name {
                    file.name = name;
                }
                if let Some(preview) = patch.preview {
                    file.preview = Some(preview);
                }
                if let Some(remote_url) = patch.remote_url {
                    file.remote_url = Some(remote_url);
                }
                if let Some(storage_key) = patch.storage_key {
                    file.storage_key = Some(storage_key);
                }
                if let Some(status) = patch.status {
                    file.status = status;
                }
                if let Some(error) = patch.error {
                    file.error = Some(error);
                }
                if let Some(meta) = patch.meta {
                    for (key, value) in meta {
                        file.meta.insert(key, value);
                    }
                }
            })
            .ok_or_else(|| UploadError::NotFound(id.to_string()))
    }

    // --- Internals --------------------------------------------------------

    pub(crate) fn stage_env(&self) -> StageEnv {
        StageEnv {
            files: Arc::new(self.inner.registry.list()),
            config: self.inner.config.clone(),
            storage: self.inner.storage.clone(),
        }
    }

    pub(crate) fn clear_uploaded_latch(&self) {
        self.inner.uploaded_latch.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_ready(&self) {
        self.inner.ready_tx.send_replace(true);
    }

    /// Schedule an `upload()` on a fresh task, after the current emission
    /// completes, so `file:added` subscribers observe the file before
    /// `upload:start` fires.
    pub(crate) fn schedule_upload(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(error) = manager.upload().await {
                tracing::warn!(error = %error, "Scheduled upload failed");
            }
        });
    }

    fn remote_url_of(&self, file: &TrackedFile) -> ManagerResult<String> {
        file.remote_url
            .clone()
            .ok_or_else(|| UploadError::Fetch(format!("file {} has no remote URL", file.id)))
    }
}
