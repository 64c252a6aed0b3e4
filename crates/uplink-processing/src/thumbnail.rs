//! Thumbnail generator plugin.
//!
//! At the preprocess stage this produces a scaled preview data URL for local
//! raster images. When configured to upload, the process stage pushes the
//! preview bytes through the adapter's standalone blob path and records the
//! resulting `{url, storage_key}` on the file. All failures here are
//! non-fatal: the file continues through its lifecycle without a preview.

use std::io::Cursor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader};
use serde_json::json;

use uplink_core::config::ThumbnailConfig;
use uplink_core::error::FileError;
use uplink_core::models::{ThumbnailRef, TrackedFile};
use uplink_core::{data_url, mime};
use uplink_plugins::{Plugin, PluginContext};

pub struct ThumbnailPlugin {
    config: ThumbnailConfig,
}

impl ThumbnailPlugin {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Plugin for ThumbnailPlugin {
    fn id(&self) -> &str {
        "thumbnail"
    }

    async fn preprocess(
        &self,
        mut file: TrackedFile,
        _ctx: &PluginContext,
    ) -> Result<TrackedFile, FileError> {
        if !file.is_local() {
            return Ok(file);
        }
        if mime::is_video(&file.mime_type) {
            // Frame extraction needs an external decoder; hosts install their
            // own preprocess plugin for video previews.
            tracing::debug!(file_id = %file.id, "Skipping video thumbnail");
            return Ok(file);
        }
        if !mime::is_processable_image(&file.mime_type) {
            return Ok(file);
        }
        let Some(data) = file.data.clone() else {
            return Ok(file);
        };

        match generate_preview(&data, &file.mime_type, &self.config) {
            Ok((preview_mime, bytes)) => {
                file.preview = Some(data_url::encode(&preview_mime, &bytes));
            }
            Err(error) => {
                tracing::warn!(file_id = %file.id, error = %error, "Thumbnail generation failed");
            }
        }
        Ok(file)
    }

    async fn process(
        &self,
        mut file: TrackedFile,
        ctx: &PluginContext,
    ) -> Result<TrackedFile, FileError> {
        if !self.config.upload || file.thumbnail.is_some() {
            return Ok(file);
        }
        let Some(storage) = ctx.storage.clone() else {
            return Ok(file);
        };
        let Some((preview_mime, bytes)) = file
            .preview
            .as_deref()
            .filter(|url| data_url::is_data_url(url))
            .and_then(data_url::decode)
        else {
            return Ok(file);
        };

        let key = thumb_key(&file.id);
        match storage.upload_blob(&key, &preview_mime, bytes).await {
            Ok(outcome) => {
                ctx.emit.emit("uploaded", json!({ "id": file.id, "url": outcome.url }));
                file.thumbnail = Some(ThumbnailRef {
                    url: outcome.url,
                    storage_key: outcome.storage_key.unwrap_or(key),
                });
            }
            Err(error) => {
                tracing::warn!(
                    file_id = %file.id,
                    key = %key,
                    error = %error,
                    "Thumbnail upload failed"
                );
            }
        }
        Ok(file)
    }
}

/// Insert `_thumb` before the extension of a file id.
pub fn thumb_key(id: &str) -> String {
    match id.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_thumb.{}", stem, ext),
        None => format!("{}_thumb", id),
    }
}

/// Decode, scale within the configured bounds and re-encode. PNG inputs stay
/// PNG (preserving transparency); everything else becomes JPEG at the
/// configured quality.
fn generate_preview(
    data: &[u8],
    mime_type: &str,
    config: &ThumbnailConfig,
) -> Result<(String, Vec<u8>)> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to sniff image format")?
        .decode()
        .context("Failed to decode image")?;

    let thumb = img.thumbnail(config.width, config.height);

    let mut buffer = Vec::new();
    if mime_type.eq_ignore_ascii_case("image/png") {
        thumb
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .context("Failed to encode PNG thumbnail")?;
        Ok(("image/png".to_string(), buffer))
    } else {
        let rgb = thumb.to_rgb8();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, config.quality);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .context("Failed to encode JPEG thumbnail")?;
        Ok(("image/jpeg".to_string(), buffer))
    }
}
