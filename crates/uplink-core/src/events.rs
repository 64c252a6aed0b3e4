//! Event vocabulary
//!
//! Core events use `<subject>:<action>` names; plugin-scoped events use
//! `<pluginId>:<action>`. Colons are the only delimiter, and subscribers
//! match the exact fully-qualified name.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::FileError;
use crate::models::TrackedFile;

/// Canonical core event names.
pub mod names {
    pub const FILE_ADDED: &str = "file:added";
    pub const FILE_REMOVED: &str = "file:removed";
    pub const FILE_REPLACED: &str = "file:replaced";
    pub const FILE_ERROR: &str = "file:error";
    pub const FILES_REORDER: &str = "files:reorder";
    pub const UPLOAD_START: &str = "upload:start";
    pub const UPLOAD_PROGRESS: &str = "upload:progress";
    pub const UPLOAD_COMPLETE: &str = "upload:complete";
    pub const FILES_UPLOADED: &str = "files:uploaded";
    pub const INITIAL_FILES_LOADED: &str = "initialFiles:loaded";
    pub const INITIAL_FILES_ERROR: &str = "initialFiles:error";
}

/// An event published on the manager bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum Event {
    FileAdded(TrackedFile),
    FileRemoved(TrackedFile),
    FileReplaced(TrackedFile),
    FileError {
        file: TrackedFile,
        error: FileError,
    },
    FilesReorder {
        old_index: usize,
        new_index: usize,
    },
    UploadStart(Vec<TrackedFile>),
    UploadProgress {
        file: TrackedFile,
        progress: u8,
    },
    UploadComplete(Vec<TrackedFile>),
    FilesUploaded(Vec<TrackedFile>),
    InitialFilesLoaded(Vec<TrackedFile>),
    InitialFilesError(String),
    /// Plugin-scoped event; delivered under `<scope>:<action>`.
    Plugin {
        scope: String,
        action: String,
        payload: JsonValue,
    },
}

impl Event {
    /// Wire name the event is delivered under.
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Event::FileAdded(_) => Cow::Borrowed(names::FILE_ADDED),
            Event::FileRemoved(_) => Cow::Borrowed(names::FILE_REMOVED),
            Event::FileReplaced(_) => Cow::Borrowed(names::FILE_REPLACED),
            Event::FileError { .. } => Cow::Borrowed(names::FILE_ERROR),
            Event::FilesReorder { .. } => Cow::Borrowed(names::FILES_REORDER),
            Event::UploadStart(_) => Cow::Borrowed(names::UPLOAD_START),
            Event::UploadProgress { .. } => Cow::Borrowed(names::UPLOAD_PROGRESS),
            Event::UploadComplete(_) => Cow::Borrowed(names::UPLOAD_COMPLETE),
            Event::FilesUploaded(_) => Cow::Borrowed(names::FILES_UPLOADED),
            Event::InitialFilesLoaded(_) => Cow::Borrowed(names::INITIAL_FILES_LOADED),
            Event::InitialFilesError(_) => Cow::Borrowed(names::INITIAL_FILES_ERROR),
            Event::Plugin { scope, action, .. } => Cow::Owned(format!("{}:{}", scope, action)),
        }
    }

    pub fn plugin(
        scope: impl Into<String>,
        action: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Event::Plugin {
            scope: scope.into(),
            action: action.into(),
            payload,
        }
    }
}
