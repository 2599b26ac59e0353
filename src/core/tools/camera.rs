//! Still-frame capture for the camera tools.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

use super::{ToolError, ToolResult};

/// Spoken back to the user when no frame is available.
pub const CAMERA_UNAVAILABLE_MESSAGE: &str = "Sorry, I can't access your camera right now.";

/// Spoken back to the user when the frame is unreadable.
pub const CAPTURE_FAILED_MESSAGE: &str = "Sorry, I couldn't capture an image from your camera.";

/// Longest side of a captured frame unless configured otherwise.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;
const JPEG_QUALITY: u8 = 85;

/// A captured frame, JPEG-encoded.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub jpeg: Bytes,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    /// `data:` URL suitable for an `image_url` content part.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            BASE64_STANDARD.encode(&self.jpeg)
        )
    }
}

/// Source of still frames.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn capture(&self) -> ToolResult<CapturedFrame>;
}

/// Camera backed by a snapshot file that an external grabber keeps updated.
///
/// Each capture reads the current file, downsizes it so neither side exceeds
/// `max_dimension`, and re-encodes it as JPEG.
#[derive(Debug, Clone)]
pub struct SnapshotCamera {
    path: PathBuf,
    max_dimension: u32,
}

impl SnapshotCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }
}

#[async_trait]
impl Camera for SnapshotCamera {
    async fn capture(&self) -> ToolResult<CapturedFrame> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            warn!("Camera snapshot {} unavailable: {}", self.path.display(), e);
            ToolError::CaptureUnavailable(CAMERA_UNAVAILABLE_MESSAGE.to_string())
        })?;

        let max_dimension = self.max_dimension;
        let frame = tokio::task::spawn_blocking(move || encode_frame(&raw, max_dimension))
            .await
            .map_err(|e| ToolError::CaptureUnavailable(format!("{CAPTURE_FAILED_MESSAGE} ({e})")))??;

        debug!(
            "Captured {}x{} frame ({} bytes)",
            frame.width,
            frame.height,
            frame.jpeg.len()
        );
        Ok(frame)
    }
}

/// Decode any supported image, bound its size and re-encode as JPEG.
pub fn encode_frame(raw: &[u8], max_dimension: u32) -> ToolResult<CapturedFrame> {
    let image = image::load_from_memory(raw).map_err(|e| {
        warn!("Camera snapshot could not be decoded: {}", e);
        ToolError::CaptureUnavailable(CAPTURE_FAILED_MESSAGE.to_string())
    })?;

    let (width, height) = image.dimensions();
    let image = if width > max_dimension || height > max_dimension {
        image.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        image
    };
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&DynamicImage::ImageRgb8(rgb))
        .map_err(|e| ToolError::CaptureUnavailable(format!("{CAPTURE_FAILED_MESSAGE} ({e})")))?;

    Ok(CapturedFrame {
        jpeg: Bytes::from(jpeg),
        width,
        height,
    })
}
