pub mod file;

pub use file::{
    derive_file_id, FileInput, FileSource, FileStatus, Progress, ThumbnailRef, TrackedFile,
};
