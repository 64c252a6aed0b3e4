//! Resource tracker
//!
//! Owns every object URL the manager creates. An object URL is an opaque
//! `mem://{uuid}` handle that keeps the referenced bytes alive until it is
//! released; release happens on file removal, data replacement, clear,
//! reset, and implicitly on teardown.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use uuid::Uuid;

struct ObjectUrl {
    url: String,
    data: Bytes,
}

pub struct ObjectUrlTracker {
    urls: Mutex<HashMap<String, ObjectUrl>>,
}

impl ObjectUrlTracker {
    pub fn new() -> Self {
        Self {
            urls: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached URL for a file, or create and track a new one
    /// holding the given bytes.
    pub fn url_for(&self, file_id: &str, data: Bytes) -> String {
        let mut urls = self.lock();
        urls.entry(file_id.to_string())
            .or_insert_with(|| ObjectUrl {
                url: format!("mem://{}", Uuid::new_v4()),
                data,
            })
            .url
            .clone()
    }

    pub fn get(&self, file_id: &str) -> Option<String> {
        self.lock().get(file_id).map(|entry| entry.url.clone())
    }

    /// Resolve a tracked URL back to the bytes it references.
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.lock()
            .values()
            .find(|entry| entry.url == url)
            .map(|entry| entry.data.clone())
    }

    /// Re-home a tracked URL under a new file id (the id changed during a
    /// transform; the handle stays valid).
    pub fn rekey(&self, old_file_id: &str, new_file_id: &str) {
        let mut urls = self.lock();
        if let Some(entry) = urls.remove(old_file_id) {
            urls.insert(new_file_id.to_string(), entry);
        }
    }

    /// Release a single file's URL. Returns whether one was tracked.
    pub fn release(&self, file_id: &str) -> bool {
        self.lock().remove(file_id).is_some()
    }

    /// Release every tracked URL.
    pub fn drain(&self) {
        let mut urls = self.lock();
        if !urls.is_empty() {
            tracing::debug!(count = urls.len(), "Releasing tracked object URLs");
        }
        urls.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ObjectUrl>> {
        self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ObjectUrlTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectUrlTracker {
    fn drop(&mut self) {
        self.drain();
    }
}
