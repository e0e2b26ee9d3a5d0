#![warn(missing_docs)]
//! # depth-chat-normalize
//!
//! ## Purpose
//! Decodes arbitrary input images and re-encodes them as bounded JPEG buffers
//! suitable for network transfer.
//!
//! ## Responsibilities
//! - Decode raw bytes (file picker, drop) or raw RGBA camera frames.
//! - Resample to a parameterizable [`TargetShape`].
//! - Encode as lossy JPEG at a caller-chosen quality.
//!
//! ## Data flow
//! Raw bytes -> [`normalize`] -> [`NormalizedImage`] consumed by the upload
//! request builder. Camera frames take the [`normalize_frame`] entry point and
//! share the same resample/encode path.
//!
//! ## Ownership and lifetimes
//! Input bytes are borrowed for the duration of the call; the output owns its
//! encoded buffer. No state is shared between calls, so independent inputs may
//! be normalized concurrently.
//!
//! ## Error model
//! Undecodable input fails with [`NormalizeError::Decode`], empty or failed
//! encodes with [`NormalizeError::Encode`], bad quality/target values with
//! [`NormalizeError::InvalidParameters`].

use depth_chat_core::NormalizedImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use thiserror::Error;

/// Longest side used for uploaded images.
pub const UPLOAD_MAX_DIMENSION: u32 = 800;
/// JPEG quality used for uploaded images.
pub const UPLOAD_QUALITY: f32 = 0.8;
/// Side of the square produced by camera captures.
pub const CAMERA_SIDE: u32 = 384;
/// JPEG quality used for camera captures.
pub const CAMERA_QUALITY: f32 = 0.9;

/// Output geometry requested from the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// Keep aspect ratio and make the longer side exactly this many pixels.
    ///
    /// Inputs smaller than the bound are scaled up as well.
    LongestSide(u32),
    /// Center-crop and resize to a `side x side` square.
    Square(u32),
}

impl TargetShape {
    /// Computes output dimensions for a `width x height` source.
    ///
    /// A `0x0` source has no aspect ratio and maps to `(0, 0)` under
    /// [`TargetShape::LongestSide`].
    pub fn dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::LongestSide(_) if width == 0 && height == 0 => (0, 0),
            Self::LongestSide(max) => {
                if width > height {
                    (max, scale_side(height, max, width))
                } else {
                    (scale_side(width, max, height), max)
                }
            }
            Self::Square(side) => (side, side),
        }
    }

    fn is_valid(self) -> bool {
        match self {
            Self::LongestSide(side) | Self::Square(side) => side > 0,
        }
    }
}

/// Shape plus quality for one call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeSpec {
    /// Output geometry.
    pub shape: TargetShape,
    /// JPEG quality in `(0.0, 1.0]`.
    pub quality: f32,
}

impl NormalizeSpec {
    /// Preset for file uploads: longest side 800, quality 0.8.
    pub const fn upload() -> Self {
        Self {
            shape: TargetShape::LongestSide(UPLOAD_MAX_DIMENSION),
            quality: UPLOAD_QUALITY,
        }
    }

    /// Preset for camera captures: 384x384 square, quality 0.9.
    pub const fn camera() -> Self {
        Self {
            shape: TargetShape::Square(CAMERA_SIDE),
            quality: CAMERA_QUALITY,
        }
    }

    /// Validates shape and quality.
    ///
    /// # Errors
    /// Returns [`NormalizeError::InvalidParameters`] for a zero-sized target or
    /// a quality outside `(0.0, 1.0]`.
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if !self.shape.is_valid() {
            return Err(NormalizeError::InvalidParameters(
                "target side must be greater than zero".to_string(),
            ));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(NormalizeError::InvalidParameters(format!(
                "quality {} is outside (0, 1]",
                self.quality
            )));
        }
        Ok(())
    }
}

/// Decodes `raw` and re-encodes it according to `spec`.
///
/// # Errors
/// See [`NormalizeError`].
pub fn normalize(
    raw: &[u8],
    spec: NormalizeSpec,
    filename: impl Into<String>,
) -> Result<NormalizedImage, NormalizeError> {
    spec.validate()?;
    let decoded =
        image::load_from_memory(raw).map_err(|error| NormalizeError::Decode(error.to_string()))?;
    encode_resampled(decoded, spec, filename.into())
}

/// Normalizes a raw RGBA frame (for example, one sampled from a camera).
///
/// # Errors
/// Returns [`NormalizeError::Decode`] when the buffer does not match
/// `width * height * 4`.
pub fn normalize_frame(
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    spec: NormalizeSpec,
    filename: impl Into<String>,
) -> Result<NormalizedImage, NormalizeError> {
    spec.validate()?;
    let buffer = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        NormalizeError::Decode(format!("frame buffer does not match {width}x{height} RGBA"))
    })?;
    encode_resampled(DynamicImage::ImageRgba8(buffer), spec, filename.into())
}

fn encode_resampled(
    decoded: DynamicImage,
    spec: NormalizeSpec,
    filename: String,
) -> Result<NormalizedImage, NormalizeError> {
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(NormalizeError::Decode("image has no pixels".to_string()));
    }

    let (width, height) = spec.shape.dimensions(decoded.width(), decoded.height());
    let resized = match spec.shape {
        TargetShape::LongestSide(_) => decoded.resize_exact(width, height, FilterType::Triangle),
        TargetShape::Square(_) => decoded.resize_to_fill(width, height, FilterType::Triangle),
    };

    // JPEG carries no alpha channel.
    let rgb = resized.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality_percent(spec.quality))
        .encode_image(&rgb)
        .map_err(|error| NormalizeError::Encode(error.to_string()))?;

    if jpeg.is_empty() {
        return Err(NormalizeError::Encode("encoder produced no output".to_string()));
    }

    NormalizedImage::new(filename, rgb.width(), rgb.height(), jpeg)
        .map_err(|error| NormalizeError::Encode(error.to_string()))
}

fn scale_side(short: u32, max: u32, long: u32) -> u32 {
    let scaled = (short as u64 * max as u64) / long as u64;
    scaled.clamp(1, u32::MAX as u64) as u32
}

fn quality_percent(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Error type for normalization.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Input could not be decoded as an image.
    #[error("image decode failure: {0}")]
    Decode(String),
    /// Re-encoding failed or produced no bytes.
    #[error("image encode failure: {0}")]
    Encode(String),
    /// Quality or target shape is unusable.
    #[error("invalid normalize parameters: {0}")]
    InvalidParameters(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for target geometry.

    use super::*;

    #[test]
    fn longest_side_scales_landscape_and_portrait() {
        let shape = TargetShape::LongestSide(800);
        assert_eq!(shape.dimensions(1600, 1200), (800, 600));
        assert_eq!(shape.dimensions(1200, 1600), (600, 800));
        assert_eq!(shape.dimensions(1000, 1000), (800, 800));
    }

    #[test]
    fn longest_side_upscales_small_inputs() {
        assert_eq!(TargetShape::LongestSide(800).dimensions(400, 300), (800, 600));
    }

    #[test]
    fn extreme_aspect_never_collapses_to_zero() {
        assert_eq!(TargetShape::LongestSide(800).dimensions(10_000, 1), (800, 1));
    }

    #[test]
    fn empty_source_has_empty_longest_side_dimensions() {
        assert_eq!(TargetShape::LongestSide(800).dimensions(0, 0), (0, 0));
        assert_eq!(TargetShape::Square(384).dimensions(0, 0), (384, 384));
    }

    #[test]
    fn quality_maps_to_percent() {
        assert_eq!(quality_percent(0.8), 80);
        assert_eq!(quality_percent(0.9), 90);
        assert_eq!(quality_percent(1.0), 100);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let spec = NormalizeSpec {
            shape: TargetShape::Square(10),
            quality: 1.5,
        };
        assert!(matches!(
            spec.validate(),
            Err(NormalizeError::InvalidParameters(_))
        ));
    }
}
