//! Public error surface of the upload manager.

use thiserror::Error;

use uplink_core::error::FileError;
use uplink_storage::AdapterError;

#[derive(Debug, Error)]
pub enum UploadError {
    /// The source name carries no extension to derive an id from.
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    /// A validator rejected the admission.
    #[error("Validation failed: {0}")]
    Validation(FileError),

    /// The operation needs a storage adapter and none is configured.
    #[error("No storage adapter configured")]
    NoStorageAdapter,

    /// An adapter call failed.
    #[error("Storage adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Fetching a remote file's bytes failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),
}

pub type ManagerResult<T> = Result<T, UploadError>;
