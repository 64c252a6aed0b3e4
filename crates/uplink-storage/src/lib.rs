//! Storage adapter port and bundled adapters.
//!
//! The [`StorageAdapter`] trait is the sole interface the upload manager
//! consumes; backends are dependency-injected capabilities. Two adapters are
//! bundled: an in-memory one for tests and demos, and a local-disk one.

pub mod keys;
pub mod local;
pub mod memory;
pub mod traits;

pub use local::LocalDiskAdapter;
pub use memory::MemoryAdapter;
pub use traits::{
    AdapterError, AdapterResult, ProgressReporter, RemoteFileInfo, StorageAdapter, UploadOutcome,
};
