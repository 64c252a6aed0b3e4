//! File registry
//!
//! The authoritative ordered sequence of tracked files. Every mutation
//! broadcasts the new snapshot, the derived total progress and the aggregate
//! status through watch channels, so subscribers registered before a
//! mutation observe it before the mutation returns.

use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::watch;

use uplink_core::models::{FileStatus, TrackedFile};

/// Aggregate manager status derived from the tracked files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerStatus {
    Idle,
    Uploading,
    Complete,
    Error,
}

pub struct FileRegistry {
    files: RwLock<Vec<TrackedFile>>,
    files_tx: watch::Sender<Vec<TrackedFile>>,
    progress_tx: watch::Sender<u8>,
    status_tx: watch::Sender<ManagerStatus>,
}

impl FileRegistry {
    pub fn new() -> Self {
        let (files_tx, _) = watch::channel(Vec::new());
        let (progress_tx, _) = watch::channel(0);
        let (status_tx, _) = watch::channel(ManagerStatus::Idle);
        Self {
            files: RwLock::new(Vec::new()),
            files_tx,
            progress_tx,
            status_tx,
        }
    }

    /// Read-only snapshot in current order.
    pub fn list(&self) -> Vec<TrackedFile> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<TrackedFile> {
        self.read().iter().find(|f| f.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().iter().any(|f| f.id == id)
    }

    pub fn push(&self, file: TrackedFile) {
        let snapshot = {
            let mut files = self.write();
            files.push(file);
            files.clone()
        };
        self.broadcast(snapshot);
    }

    /// Apply a mutation to the file with the given id; returns the updated
    /// clone, or `None` when the id is unknown.
    pub fn update<F>(&self, id: &str, mutate: F) -> Option<TrackedFile>
    where
        F: FnOnce(&mut TrackedFile),
    {
        let (updated, snapshot) = {
            let mut files = self.write();
            let entry = files.iter_mut().find(|f| f.id == id)?;
            mutate(entry);
            (entry.clone(), files.clone())
        };
        self.broadcast(snapshot);
        Some(updated)
    }

    /// Replace the entry with the given id in place (the replacement may
    /// carry a different id). Returns the previous entry.
    pub fn replace_by_id(&self, id: &str, file: TrackedFile) -> Option<TrackedFile> {
        let (old, snapshot) = {
            let mut files = self.write();
            let index = files.iter().position(|f| f.id == id)?;
            let old = std::mem::replace(&mut files[index], file);
            (old, files.clone())
        };
        self.broadcast(snapshot);
        Some(old)
    }

    pub fn remove(&self, id: &str) -> Option<TrackedFile> {
        let (removed, snapshot) = {
            let mut files = self.write();
            let index = files.iter().position(|f| f.id == id)?;
            let removed = files.remove(index);
            (removed, files.clone())
        };
        self.broadcast(snapshot);
        Some(removed)
    }

    /// Splice a file from `old_index` to `new_index`. Returns `false` (and
    /// leaves the order untouched) when the indices are equal or out of
    /// bounds.
    pub fn move_file(&self, old_index: usize, new_index: usize) -> bool {
        let snapshot = {
            let mut files = self.write();
            if old_index == new_index || old_index >= files.len() || new_index >= files.len() {
                return false;
            }
            let file = files.remove(old_index);
            files.insert(new_index, file);
            files.clone()
        };
        self.broadcast(snapshot);
        true
    }

    pub fn clear(&self) -> Vec<TrackedFile> {
        let removed = {
            let mut files = self.write();
            std::mem::take(&mut *files)
        };
        self.broadcast(Vec::new());
        removed
    }

    /// Floor of the mean progress percentage across all tracked files; 0
    /// when empty. Errored files stay in the denominator as 0% contributors
    /// until they are removed.
    pub fn total_progress(&self) -> u8 {
        derive_progress(&self.read())
    }

    /// Non-empty and every file complete.
    pub fn all_complete(&self) -> bool {
        let files = self.read();
        !files.is_empty() && files.iter().all(|f| f.status == FileStatus::Complete)
    }

    pub fn watch_files(&self) -> watch::Receiver<Vec<TrackedFile>> {
        self.files_tx.subscribe()
    }

    pub fn watch_progress(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<ManagerStatus> {
        self.status_tx.subscribe()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<TrackedFile>> {
        self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<TrackedFile>> {
        self.files.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn broadcast(&self, snapshot: Vec<TrackedFile>) {
        self.progress_tx.send_replace(derive_progress(&snapshot));
        self.status_tx.send_replace(derive_status(&snapshot));
        self.files_tx.send_replace(snapshot);
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_progress(files: &[TrackedFile]) -> u8 {
    if files.is_empty() {
        return 0;
    }
    let sum: u64 = files
        .iter()
        .map(|f| {
            if f.status == FileStatus::Error {
                0
            } else {
                f.progress.percentage as u64
            }
        })
        .sum();
    (sum / files.len() as u64) as u8
}

fn derive_status(files: &[TrackedFile]) -> ManagerStatus {
    if files.iter().any(|f| f.status == FileStatus::Uploading) {
        ManagerStatus::Uploading
    } else if files.iter().any(|f| f.status == FileStatus::Error) {
        ManagerStatus::Error
    } else if !files.is_empty() && files.iter().all(|f| f.status == FileStatus::Complete) {
        ManagerStatus::Complete
    } else {
        ManagerStatus::Idle
    }
}
