//! Processing plugins: preview thumbnails and image recompression.

pub mod compression;
pub mod thumbnail;

pub use compression::CompressionPlugin;
pub use thumbnail::ThumbnailPlugin;
