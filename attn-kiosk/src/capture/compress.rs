//! JPEG encoding under a size budget
//!
//! The first encode is at the snapshot quality and native resolution. When
//! that is over budget the encoded image is decoded, the longer side is capped
//! at `max_dimension`, and it is re-encoded at decreasing qualities until it
//! fits or the quality floor is reached. The floor attempt is accepted even if
//! it is still over budget.
//!
//! Qualities are handled as integer percentages so the step count is exact.

use attn_common::config::CameraConfig;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageError, RgbImage};

/// Compression parameters in JPEG quality percent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionSettings {
    pub initial_quality: u8,
    pub compress_quality: u8,
    pub quality_step: u8,
    pub quality_floor: u8,
    pub max_dimension: u32,
    pub max_bytes: usize,
}

fn percent(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

impl From<&CameraConfig> for CompressionSettings {
    fn from(config: &CameraConfig) -> Self {
        Self {
            initial_quality: percent(config.quality),
            compress_quality: percent(config.compress_quality),
            quality_step: percent(config.quality_step),
            quality_floor: percent(config.quality_floor),
            max_dimension: config.max_dimension,
            max_bytes: config.max_file_size,
        }
    }
}

impl CompressionSettings {
    /// Upper bound on encode calls for one capture (snapshot included)
    pub fn max_encode_attempts(&self) -> u32 {
        let span = u32::from(self.compress_quality.saturating_sub(self.quality_floor));
        let step = u32::from(self.quality_step.max(1));
        // snapshot + first re-encode + one per step down to the floor
        2 + span.div_ceil(step)
    }
}

/// Result of [`encode_within_budget`]
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Quality percent of the accepted encode
    pub quality: u8,
    pub encode_attempts: u32,
}

impl EncodedImage {
    pub fn within(&self, max_bytes: usize) -> bool {
        self.bytes.len() <= max_bytes
    }
}

/// Encode an RGB frame as JPEG at `quality` percent
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.encode_image(frame)?;
    Ok(bytes)
}

/// Cap the longer side at `max_dimension`, preserving aspect ratio
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (u64::from(short) * u64::from(max_dimension) + u64::from(long) / 2) / u64::from(long);
        (scaled as u32).max(1)
    };

    if width > height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Encode `frame`, shrinking and lowering quality until under budget
pub fn encode_within_budget(
    frame: &RgbImage,
    settings: &CompressionSettings,
) -> Result<EncodedImage, ImageError> {
    let snapshot = encode_jpeg(frame, settings.initial_quality)?;
    let mut attempts = 1;

    if snapshot.len() <= settings.max_bytes {
        return Ok(EncodedImage {
            bytes: snapshot,
            width: frame.width(),
            height: frame.height(),
            quality: settings.initial_quality,
            encode_attempts: attempts,
        });
    }

    let decoded = image::load_from_memory(&snapshot)?.to_rgb8();
    let (width, height) =
        scaled_dimensions(decoded.width(), decoded.height(), settings.max_dimension);
    let scaled = if (width, height) == decoded.dimensions() {
        decoded
    } else {
        image::imageops::resize(&decoded, width, height, FilterType::Triangle)
    };

    let floor = settings.quality_floor.min(settings.compress_quality);
    let step = settings.quality_step.max(1);
    let mut quality = settings.compress_quality;

    loop {
        let bytes = encode_jpeg(&scaled, quality)?;
        attempts += 1;

        if bytes.len() <= settings.max_bytes || quality <= floor {
            return Ok(EncodedImage {
                bytes,
                width,
                height,
                quality,
                encode_attempts: attempts,
            });
        }

        quality = quality.saturating_sub(step).max(floor);
    }
}
