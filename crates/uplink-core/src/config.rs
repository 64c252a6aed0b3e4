//! Configuration module
//!
//! Construction-time options for an upload manager. Every limit uses
//! `Option` as its disabled sentinel; built-in validators and processors are
//! only installed when the corresponding option is set.

use anyhow::{anyhow, Result};
use tokio::sync::watch;

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 200;
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 200;
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 75;
pub const DEFAULT_COMPRESSION_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_COMPRESSION_MAX_HEIGHT: u32 = 1920;
pub const DEFAULT_COMPRESSION_QUALITY: u8 = 75;
pub const DEFAULT_MIN_SIZE_TO_COMPRESS: u64 = 100 * 1024;

/// Thumbnail generation options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailConfig {
    /// Maximum thumbnail width in pixels.
    pub width: u32,
    /// Maximum thumbnail height in pixels.
    pub height: u32,
    /// Re-encode quality (0-100) for lossy formats.
    pub quality: u8,
    /// Upload the generated thumbnail through the adapter's standalone path.
    pub upload: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_THUMBNAIL_WIDTH,
            height: DEFAULT_THUMBNAIL_HEIGHT,
            quality: DEFAULT_THUMBNAIL_QUALITY,
            upload: false,
        }
    }
}

/// Output format for recompressed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Keep the input format.
    #[default]
    Auto,
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(OutputFormat::Auto),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(anyhow!("Invalid output format: {}", s)),
        }
    }

    /// MIME type for a concrete format; `None` for `Auto` (input-preserving).
    pub fn to_mime_type(self) -> Option<&'static str> {
        match self {
            OutputFormat::Auto => None,
            OutputFormat::Jpeg => Some("image/jpeg"),
            OutputFormat::Png => Some("image/png"),
            OutputFormat::WebP => Some("image/webp"),
        }
    }
}

/// Image compression options for the process stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressionConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Re-encode quality (0-100) for lossy formats.
    pub quality: u8,
    pub output_format: OutputFormat,
    /// Files below this byte size are left untouched.
    pub min_size_to_compress: u64,
    /// Best effort; re-encoding through a pixel buffer drops EXIF regardless.
    pub preserve_metadata: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_COMPRESSION_MAX_WIDTH,
            max_height: DEFAULT_COMPRESSION_MAX_HEIGHT,
            quality: DEFAULT_COMPRESSION_QUALITY,
            output_format: OutputFormat::Auto,
            min_size_to_compress: DEFAULT_MIN_SIZE_TO_COMPRESS,
            preserve_metadata: false,
        }
    }
}

/// Declarative references to pre-existing remote files, resolved at
/// construction time.
///
/// The `Watch` form subscribes to a channel and resolves exactly once on the
/// first defined, non-empty value; later values are ignored.
#[derive(Clone, Debug, Default)]
pub enum InitialFiles {
    #[default]
    None,
    Keys(Vec<String>),
    Watch(watch::Receiver<Option<Vec<String>>>),
}

impl InitialFiles {
    pub fn is_none(&self) -> bool {
        matches!(self, InitialFiles::None)
    }
}

impl From<&str> for InitialFiles {
    fn from(key: &str) -> Self {
        InitialFiles::Keys(vec![key.to_string()])
    }
}

impl From<String> for InitialFiles {
    fn from(key: String) -> Self {
        InitialFiles::Keys(vec![key])
    }
}

impl From<Vec<String>> for InitialFiles {
    fn from(keys: Vec<String>) -> Self {
        InitialFiles::Keys(keys)
    }
}

impl From<watch::Receiver<Option<Vec<String>>>> for InitialFiles {
    fn from(rx: watch::Receiver<Option<Vec<String>>>) -> Self {
        InitialFiles::Watch(rx)
    }
}

/// Manager construction options.
///
/// Storage adapters and extra plugins are wired through the manager builder
/// rather than carried here, keeping this crate free of the plugin traits.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Maximum number of tracked files; `None` disables the check.
    pub max_files: Option<usize>,
    /// Maximum file size in bytes; `None` disables the check.
    pub max_file_size: Option<u64>,
    /// Admissible MIME types; `None` or empty disables the check.
    pub allowed_file_types: Option<Vec<String>>,
    /// Reject files matching an already-tracked name/size/mtime triple.
    pub detect_duplicates: bool,
    /// Generate previews on admission when set.
    pub thumbnails: Option<ThumbnailConfig>,
    /// Recompress images at upload time when set.
    pub image_compression: Option<CompressionConfig>,
    /// Schedule an upload right after each successful admission.
    pub auto_upload: bool,
    /// Remote references to resolve at construction.
    pub initial_files: InitialFiles,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_files: None,
            max_file_size: None,
            allowed_file_types: None,
            detect_duplicates: true,
            thumbnails: None,
            image_compression: None,
            auto_upload: false,
            initial_files: InitialFiles::None,
        }
    }
}

impl ManagerConfig {
    /// Allowed-types check is active only for a non-empty set.
    pub fn allowed_types_active(&self) -> bool {
        self.allowed_file_types
            .as_ref()
            .is_some_and(|types| !types.is_empty())
    }
}
