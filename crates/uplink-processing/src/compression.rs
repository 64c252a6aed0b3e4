//! Image compression plugin.
//!
//! Runs at the process stage, ahead of the storage upload: decodes eligible
//! images, scales them within the configured bounds and re-encodes at the
//! configured quality and format. The original bytes are kept whenever the
//! recompressed output is not actually smaller; skipped files announce the
//! reason through the plugin-scoped `skip` event.

use std::io::Cursor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat, ImageReader};
use serde_json::json;

use uplink_core::config::{CompressionConfig, OutputFormat};
use uplink_core::error::FileError;
use uplink_core::models::TrackedFile;
use uplink_core::mime;
use uplink_plugins::{Plugin, PluginContext};

pub struct CompressionPlugin {
    config: CompressionConfig,
}

impl CompressionPlugin {
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    /// Target MIME type for a given input. `Auto` preserves the input when it
    /// is directly re-encodable, falling back to JPEG otherwise.
    fn target_mime(&self, input_mime: &str) -> &'static str {
        if let Some(mime_type) = self.config.output_format.to_mime_type() {
            return mime_type;
        }
        match input_mime.to_lowercase().as_str() {
            "image/png" => "image/png",
            "image/webp" => "image/webp",
            _ => "image/jpeg",
        }
    }
}

#[async_trait]
impl Plugin for CompressionPlugin {
    fn id(&self) -> &str {
        "image-compression"
    }

    async fn process(
        &self,
        mut file: TrackedFile,
        ctx: &PluginContext,
    ) -> Result<TrackedFile, FileError> {
        if !file.is_local() {
            return Ok(file);
        }
        if !mime::is_processable_image(&file.mime_type) {
            ctx.emit.emit(
                "skip",
                json!({ "id": file.id, "reason": "not-an-image", "mime_type": file.mime_type }),
            );
            return Ok(file);
        }
        if file.size < self.config.min_size_to_compress {
            ctx.emit.emit(
                "skip",
                json!({ "id": file.id, "reason": "below-min-size", "size": file.size }),
            );
            return Ok(file);
        }
        let Some(data) = file.data.clone() else {
            return Ok(file);
        };

        let target_mime = self.target_mime(&file.mime_type);
        let compressed = match compress(&data, target_mime, &self.config) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(file_id = %file.id, error = %error, "Image compression failed");
                ctx.emit.emit(
                    "skip",
                    json!({ "id": file.id, "reason": "decode-failed" }),
                );
                return Ok(file);
            }
        };

        if compressed.len() as u64 >= file.size {
            ctx.emit.emit(
                "skip",
                json!({
                    "id": file.id,
                    "reason": "not-smaller",
                    "original_size": file.size,
                    "compressed_size": compressed.len(),
                }),
            );
            return Ok(file);
        }

        tracing::debug!(
            file_id = %file.id,
            original_size = file.size,
            compressed_size = compressed.len(),
            mime_type = target_mime,
            "Compressed image"
        );

        file.size = compressed.len() as u64;
        file.data = Some(Bytes::from(compressed));
        if !file.mime_type.eq_ignore_ascii_case(target_mime) {
            file.mime_type = target_mime.to_string();
            if let Some(ext) = mime::extension_for_mime(target_mime) {
                file.rewrite_id_extension(ext);
            }
        }
        Ok(file)
    }
}

/// Decode, scale within bounds preserving aspect ratio, re-encode.
///
/// Quality applies to JPEG output; PNG and WebP encode losslessly through the
/// `image` crate. Re-encoding through a pixel buffer drops EXIF metadata.
fn compress(data: &[u8], target_mime: &str, config: &CompressionConfig) -> Result<Vec<u8>> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to sniff image format")?
        .decode()
        .context("Failed to decode image")?;

    let (width, height) = img.dimensions();
    let img = if width > config.max_width || height > config.max_height {
        let (new_width, new_height) =
            fit_within(width, height, config.max_width, config.max_height);
        let filter = select_filter(width, height, new_width, new_height);
        img.resize_exact(new_width, new_height, filter)
    } else {
        img
    };

    let mut buffer = Vec::new();
    match target_mime {
        "image/png" => {
            img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                .context("Failed to encode PNG")?;
        }
        "image/webp" => {
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(&mut buffer)
                .encode(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    image::ExtendedColorType::Rgba8,
                )
                .context("Failed to encode WebP")?;
        }
        _ => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, config.quality)
                .encode(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .context("Failed to encode JPEG")?;
        }
    }
    Ok(buffer)
}

/// Largest dimensions fitting the bounds while preserving aspect ratio.
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let scale = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
    let new_width = ((width as f32 * scale).round() as u32).max(1);
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    (new_width, new_height)
}

/// Pick a resampling filter by downscale ratio. Heavy reductions tolerate
/// cheaper kernels; near-1:1 scaling keeps the sharper one.
fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::{Arc, Mutex};
    use uplink_core::bus::EventBus;
    use uplink_core::config::ManagerConfig;
    use uplink_core::models::FileInput;

    /// Noisy image so PNG encoding stays large and JPEG wins decisively.
    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbaImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 31 + y * 17) % 255) as u8;
                img.put_pixel(x, y, Rgba([v, v.wrapping_mul(3), v.wrapping_add(91), 255]));
            }
        }
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn ctx_with_bus(bus: &EventBus) -> PluginContext {
        PluginContext {
            files: Arc::new(Vec::new()),
            config: Arc::new(ManagerConfig::default()),
            storage: None,
            emit: bus.scoped("image-compression"),
        }
    }

    fn png_file(data: Vec<u8>) -> TrackedFile {
        let input = FileInput::new("photo.png", data);
        TrackedFile::local("1-photo.png".to_string(), &input)
    }

    fn skip_reasons(bus: &EventBus) -> Arc<Mutex<Vec<String>>> {
        let reasons = Arc::new(Mutex::new(Vec::new()));
        {
            let reasons = reasons.clone();
            bus.on("image-compression:skip", move |event| {
                if let uplink_core::events::Event::Plugin { payload, .. } = event {
                    reasons
                        .lock()
                        .unwrap()
                        .push(payload["reason"].as_str().unwrap_or("").to_string());
                }
                Ok(())
            });
        }
        reasons
    }

    #[tokio::test]
    async fn test_compresses_to_jpeg_and_rewrites_id() {
        let plugin = CompressionPlugin::new(CompressionConfig {
            min_size_to_compress: 1,
            output_format: OutputFormat::Jpeg,
            quality: 60,
            ..Default::default()
        });
        let bus = EventBus::new();
        let file = png_file(noisy_png(128, 128));
        let original_size = file.size;

        let file = plugin.process(file, &ctx_with_bus(&bus)).await.unwrap();
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.id, "1-photo.jpg");
        assert!(file.size < original_size);
        assert_eq!(file.data.as_ref().unwrap().len() as u64, file.size);
    }

    #[tokio::test]
    async fn test_scales_down_oversized_images() {
        let plugin = CompressionPlugin::new(CompressionConfig {
            min_size_to_compress: 1,
            max_width: 32,
            max_height: 32,
            output_format: OutputFormat::Jpeg,
            ..Default::default()
        });
        let bus = EventBus::new();
        let file = png_file(noisy_png(128, 64));

        let file = plugin.process(file, &ctx_with_bus(&bus)).await.unwrap();
        let img = image::load_from_memory(file.data.as_ref().unwrap()).unwrap();
        // Aspect ratio preserved within the 32x32 box.
        assert_eq!(img.dimensions(), (32, 16));
    }

    #[tokio::test]
    async fn test_skips_below_min_size() {
        let plugin = CompressionPlugin::new(CompressionConfig {
            min_size_to_compress: 1024 * 1024,
            ..Default::default()
        });
        let bus = EventBus::new();
        let reasons = skip_reasons(&bus);
        let file = png_file(noisy_png(16, 16));
        let original = file.data.clone();

        let file = plugin.process(file, &ctx_with_bus(&bus)).await.unwrap();
        assert_eq!(file.data, original);
        assert_eq!(*reasons.lock().unwrap(), vec!["below-min-size"]);
    }

    #[tokio::test]
    async fn test_skips_when_not_smaller() {
        // Tiny solid PNG: JPEG output will not beat it.
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();

        let plugin = CompressionPlugin::new(CompressionConfig {
            min_size_to_compress: 1,
            output_format: OutputFormat::Jpeg,
            ..Default::default()
        });
        let bus = EventBus::new();
        let reasons = skip_reasons(&bus);
        let file = png_file(buffer);
        let original = file.data.clone();

        let file = plugin.process(file, &ctx_with_bus(&bus)).await.unwrap();
        assert_eq!(file.data, original);
        assert_eq!(file.id, "1-photo.png");
        assert_eq!(*reasons.lock().unwrap(), vec!["not-smaller"]);
    }

    #[tokio::test]
    async fn test_skips_gif_with_reason() {
        let plugin = CompressionPlugin::new(CompressionConfig {
            min_size_to_compress: 1,
            ..Default::default()
        });
        let bus = EventBus::new();
        let reasons = skip_reasons(&bus);

        let mut file = png_file(noisy_png(16, 16));
        file.mime_type = "image/gif".to_string();
        let original = file.data.clone();

        let file = plugin.process(file, &ctx_with_bus(&bus)).await.unwrap();
        assert_eq!(file.data, original);
        assert_eq!(*reasons.lock().unwrap(), vec!["not-an-image"]);
    }

    #[test]
    fn test_fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(128, 64, 32, 32), (32, 16));
        assert_eq!(fit_within(64, 128, 32, 32), (16, 32));
        assert_eq!(fit_within(4000, 10, 32, 32), (32, 1));
    }

    #[test]
    fn test_select_filter_by_downscale_ratio() {
        assert_eq!(select_filter(100, 100, 40, 40), FilterType::Triangle);
        assert_eq!(select_filter(100, 100, 60, 60), FilterType::CatmullRom);
        assert_eq!(select_filter(100, 100, 90, 90), FilterType::Lanczos3);
    }

    #[tokio::test]
    async fn test_undecodable_data_is_contained() {
        let plugin = CompressionPlugin::new(CompressionConfig {
            min_size_to_compress: 1,
            ..Default::default()
        });
        let bus = EventBus::new();
        let reasons = skip_reasons(&bus);

        let input = FileInput::new("broken.png", &b"definitely not a png"[..]);
        let file = TrackedFile::local("1-broken.png".to_string(), &input);
        let file = plugin.process(file, &ctx_with_bus(&bus)).await.unwrap();

        assert!(file.error.is_none());
        assert_eq!(*reasons.lock().unwrap(), vec!["decode-failed"]);
    }
}
