//! Uplink Core Library
//!
//! This crate provides the domain models, configuration, event vocabulary and
//! error types shared across all uplink components.

pub mod bus;
pub mod config;
pub mod data_url;
pub mod error;
pub mod events;
pub mod mime;
pub mod models;

// Re-export commonly used types
pub use bus::{EventBus, EventHandler, HandlerId, ScopedEmitter};
pub use config::{
    CompressionConfig, InitialFiles, ManagerConfig, OutputFormat, ThumbnailConfig,
};
pub use error::{FileError, FileErrorKind};
pub use events::Event;
pub use models::{FileInput, FileSource, FileStatus, Progress, ThumbnailRef, TrackedFile};
