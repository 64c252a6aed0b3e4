//! Uplink — a reactive, plugin-driven file upload manager.
//!
//! Files enter through the manager's operations, pass through a lifecycle of
//! plugin hooks (validate → preprocess → process → upload → complete) and
//! are driven to completion against a pluggable storage backend. State is
//! observable through watch channels and a typed event bus; all of it is
//! in-memory for the lifetime of the manager.
//!
//! ```no_run
//! use std::sync::Arc;
//! use uplink::{FileInput, ManagerConfig, MemoryAdapter, UploadManager};
//!
//! # async fn demo() -> Result<(), uplink::UploadError> {
//! let manager = UploadManager::builder()
//!     .config(ManagerConfig {
//!         max_file_size: Some(10 * 1024 * 1024),
//!         ..Default::default()
//!     })
//!     .storage(Arc::new(MemoryAdapter::new("https://cdn.example.com")))
//!     .build();
//!
//! manager
//!     .add_file(FileInput::new("photo.jpg", vec![0u8; 1024]))
//!     .await?;
//! let completed = manager.upload().await?;
//! assert_eq!(completed.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod init;
pub mod manager;
pub mod registry;
pub mod resources;
pub mod upload;

pub use builder::UploadManagerBuilder;
pub use error::{ManagerResult, UploadError};
pub use manager::{ByteStream, DeleteFromStorage, FilePatch, RemoveOptions, UploadManager};
pub use registry::ManagerStatus;
pub use resources::ObjectUrlTracker;

// Re-export the crates that make up the public surface.
pub use uplink_core::bus::{EventBus, HandlerId, ScopedEmitter};
pub use uplink_core::config::{
    CompressionConfig, InitialFiles, ManagerConfig, OutputFormat, ThumbnailConfig,
};
pub use uplink_core::error::{FileError, FileErrorKind};
pub use uplink_core::events::{names as event_names, Event};
pub use uplink_core::models::{
    FileInput, FileSource, FileStatus, Progress, ThumbnailRef, TrackedFile,
};
pub use uplink_plugins::{Plugin, PluginContext, PluginRunner, StageEnv, StageFailure};
pub use uplink_processing::{CompressionPlugin, ThumbnailPlugin};
pub use uplink_storage::{
    AdapterError, AdapterResult, LocalDiskAdapter, MemoryAdapter, ProgressReporter,
    RemoteFileInfo, StorageAdapter, UploadOutcome,
};
