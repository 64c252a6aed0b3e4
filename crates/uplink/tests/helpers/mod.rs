//! Shared test fixtures: a scripted storage adapter and an event recorder.
#![allow(dead_code)] // not every test binary uses every fixture

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use uplink::{
    AdapterError, AdapterResult, Event, FileInput, ProgressReporter, RemoteFileInfo,
    StorageAdapter, TrackedFile, UploadManager, UploadOutcome,
};

/// Storage adapter with a scripted progress sequence, canned remote
/// metadata and call recording.
pub struct MockAdapter {
    base_url: String,
    progress_script: Vec<u8>,
    fail_matching: Option<String>,
    pub uploads: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
    pub remote: Mutex<HashMap<String, RemoteFileInfo>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            base_url: "https://files.test".to_string(),
            progress_script: vec![25, 50, 75, 100],
            fail_matching: None,
            uploads: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            remote: Mutex::new(HashMap::new()),
        }
    }

    /// Fail uploads of files whose name contains the given fragment.
    pub fn failing_for(fragment: &str) -> Self {
        Self {
            fail_matching: Some(fragment.to_string()),
            ..Self::new()
        }
    }

    pub fn insert_remote(&self, key: &str, size: u64, mime_type: &str) {
        self.remote.lock().unwrap().insert(
            key.to_string(),
            RemoteFileInfo {
                size,
                mime_type: mime_type.to_string(),
                remote_url: format!("{}/{}", self.base_url, key),
                preview: None,
                upload_result: Some(json!({ "origin": "seeded" })),
            },
        );
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn removed_keys(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageAdapter for MockAdapter {
    fn id(&self) -> &str {
        "mock-storage"
    }

    async fn upload(
        &self,
        file: &TrackedFile,
        progress: &ProgressReporter,
    ) -> AdapterResult<UploadOutcome> {
        if let Some(fragment) = &self.fail_matching {
            if file.name.contains(fragment.as_str()) {
                return Err(AdapterError::UploadFailed("scripted failure".to_string()));
            }
        }
        for pct in &self.progress_script {
            progress.report(*pct);
        }
        self.uploads.lock().unwrap().push(file.id.clone());

        let url = format!("{}/{}", self.base_url, file.id);
        self.remote.lock().unwrap().insert(
            file.id.clone(),
            RemoteFileInfo {
                size: file.size,
                mime_type: file.mime_type.clone(),
                remote_url: url.clone(),
                preview: None,
                upload_result: None,
            },
        );
        Ok(UploadOutcome::new(url).with_storage_key(file.id.clone()))
    }

    async fn get_remote_file(&self, storage_key: &str) -> AdapterResult<RemoteFileInfo> {
        self.remote
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(storage_key.to_string()))
    }

    async fn remove(&self, file: &TrackedFile) -> AdapterResult<()> {
        let key = file
            .storage_key
            .clone()
            .or_else(|| {
                file.remote_url
                    .as_deref()
                    .and_then(|url| url.rsplit('/').next())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        self.remote.lock().unwrap().remove(&key);
        self.removed.lock().unwrap().push(key);
        Ok(())
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Records event names in emission order, plus upload progress percentages.
pub struct EventRecorder {
    names: Arc<Mutex<Vec<String>>>,
    progress: Arc<Mutex<Vec<u8>>>,
}

impl EventRecorder {
    pub fn attach(manager: &UploadManager) -> Self {
        let recorder = Self {
            names: Arc::new(Mutex::new(Vec::new())),
            progress: Arc::new(Mutex::new(Vec::new())),
        };
        for name in [
            "file:added",
            "file:removed",
            "file:replaced",
            "file:error",
            "files:reorder",
            "upload:start",
            "upload:progress",
            "upload:complete",
            "files:uploaded",
            "initialFiles:loaded",
            "initialFiles:error",
        ] {
            let names = recorder.names.clone();
            let progress = recorder.progress.clone();
            manager.on(name, move |event| {
                names.lock().unwrap().push(event.name().to_string());
                if let Event::UploadProgress { progress: pct, .. } = event {
                    progress.lock().unwrap().push(*pct);
                }
                Ok(())
            });
        }
        recorder
    }

    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names.lock().unwrap().iter().filter(|n| *n == name).count()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }
}

/// A small PNG-named input with arbitrary bytes.
pub fn input(name: &str, size: usize) -> FileInput {
    FileInput::new(name, vec![7u8; size])
}

/// Poll until the condition holds or two seconds elapse.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within 2s");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
