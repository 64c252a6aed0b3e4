//! Cross-file upload orchestration.

use serde_json::Value as JsonValue;

use uplink_core::error::FileError;
use uplink_core::events::Event;
use uplink_core::models::{FileStatus, Progress, TrackedFile};
use uplink_storage::ProgressReporter;

use crate::error::{ManagerResult, UploadError};
use crate::manager::UploadManager;

impl UploadManager {
    /// Upload every file currently in `waiting` state, sequentially in
    /// registry order.
    ///
    /// Per file: run `process` hooks (a failure marks the file `error` and
    /// moves on), transition to `uploading`, forward adapter progress into
    /// the registry and `upload:progress`, then settle to `complete` or
    /// `error`. Emits `upload:start` before the first file and
    /// `upload:complete` with the files that newly completed; failures never
    /// abort the rest of the batch. Files in any non-`waiting` state are
    /// skipped, so repeated calls are idempotent. Overlapping calls
    /// serialize.
    pub async fn upload(&self) -> ManagerResult<Vec<TrackedFile>> {
        let _gate = self.inner.upload_gate.lock().await;

        let snapshot: Vec<TrackedFile> = self
            .inner
            .registry
            .list()
            .into_iter()
            .filter(|f| f.status == FileStatus::Waiting)
            .collect();
        if snapshot.is_empty() {
            self.maybe_emit_files_uploaded();
            return Ok(Vec::new());
        }
        let storage = self
            .inner
            .storage
            .clone()
            .ok_or(UploadError::NoStorageAdapter)?;

        self.inner.bus.emit(&Event::UploadStart(snapshot.clone()));

        let mut completed = Vec::new();
        for file in snapshot {
            let original_id = file.id;
            let Some(current) = self.inner.registry.by_id(&original_id) else {
                // Removed while the batch was running.
                continue;
            };
            if current.status != FileStatus::Waiting {
                continue;
            }

            let env = self.stage_env();
            let processed = match self.inner.runner.run_process(current, &env).await {
                Ok(file) => file,
                Err(failure) => {
                    // The runner already emitted file:error for the hook.
                    let error = failure.error;
                    self.inner
                        .registry
                        .update(&original_id, move |f| f.set_error(error));
                    continue;
                }
            };

            let mut uploading = processed;
            uploading.status = FileStatus::Uploading;
            if uploading.id != original_id {
                self.inner.resources.rekey(&original_id, &uploading.id);
            }
            let file_id = uploading.id.clone();
            self.inner
                .registry
                .replace_by_id(&original_id, uploading.clone());

            let reporter = {
                let manager = self.clone();
                let file_id = file_id.clone();
                ProgressReporter::new(move |percentage| {
                    let updated = manager.inner.registry.update(&file_id, |f| {
                        if percentage > f.progress.percentage {
                            f.progress = Progress::new(percentage);
                        }
                    });
                    if let Some(file) = updated {
                        manager.inner.bus.emit(&Event::UploadProgress {
                            file,
                            progress: percentage,
                        });
                    }
                })
            };

            match storage.upload(&uploading, &reporter).await {
                Ok(outcome) => {
                    let upload_result =
                        serde_json::to_value(&outcome).unwrap_or(JsonValue::Null);
                    let url = outcome.url;
                    let storage_key = outcome.storage_key;
                    let done = self.inner.registry.update(&file_id, move |f| {
                        f.status = FileStatus::Complete;
                        f.progress = Progress::complete();
                        if let Some(key) = storage_key {
                            f.storage_key = Some(key);
                        }
                        if f.preview.is_none() {
                            f.preview = Some(url.clone());
                        }
                        f.remote_url = Some(url);
                        f.upload_result = Some(upload_result);
                        f.error = None;
                    });
                    if let Some(done) = done {
                        let env = self.stage_env();
                        self.inner.runner.run_complete(&done, &env).await;
                        completed.push(done);
                    }
                }
                Err(error) => {
                    tracing::warn!(file_id = %file_id, error = %error, "Upload failed");
                    let file_error = FileError::new(error.to_string());
                    let errored = self.inner.registry.update(&file_id, {
                        let file_error = file_error.clone();
                        move |f| f.set_error(file_error)
                    });
                    if let Some(file) = errored {
                        self.inner.bus.emit(&Event::FileError {
                            file,
                            error: file_error,
                        });
                    }
                }
            }
        }

        self.inner.bus.emit(&Event::UploadComplete(completed.clone()));
        self.maybe_emit_files_uploaded();
        Ok(completed)
    }

    /// Emit `files:uploaded` once per completion cycle: only when every
    /// tracked file is complete, guarded by a latch that clears whenever a
    /// mutation reintroduces a non-complete file.
    pub(crate) fn maybe_emit_files_uploaded(&self) {
        use std::sync::atomic::Ordering;

        if self.inner.registry.all_complete()
            && !self.inner.uploaded_latch.swap(true, Ordering::SeqCst)
        {
            self.inner
                .bus
                .emit(&Event::FilesUploaded(self.inner.registry.list()));
        }
    }
}
