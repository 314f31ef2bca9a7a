//! Size-constrained encoder and plain single-pass encoders.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` (baseline) |
//! | PNG | `DynamicImage::write_to` with `ImageFormat::Png` |
//! | Pre-search downscale | `resize_exact` with `Lanczos3` |

use super::bitmap::ensure_valid;
use super::calculations::{bytes_to_kb, fit_within, quality_schedule};
use super::params::Quality;
use crate::error::PhotoError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use serde::Serialize;
use std::io::Cursor;

/// Longer-side limit applied before the quality search.
pub const MAX_SEARCH_DIMENSION: u32 = 2000;

/// Quality decrement between search steps.
pub const DEFAULT_QUALITY_STEP: u8 = 5;

/// One finished JPEG encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingResult {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Quality actually used for `bytes`.
    pub quality: u8,
    /// `bytes.len() / 1024`.
    pub size_kb: f64,
    pub width: u32,
    pub height: u32,
}

impl EncodingResult {
    pub fn met_budget(&self, target_kb: f64) -> bool {
        self.size_kb <= target_kb
    }
}

/// Encode as baseline JPEG at a fixed quality. Alpha is dropped.
pub fn encode_jpeg(bitmap: &DynamicImage, quality: Quality) -> Result<Vec<u8>, PhotoError> {
    ensure_valid(bitmap)?;
    let rgb = bitmap.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.value())
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| PhotoError::Encode(format!("JPEG: {e}")))?;
    Ok(buf)
}

/// Encode losslessly as PNG, keeping the bitmap's channel layout.
pub fn encode_png(bitmap: &DynamicImage) -> Result<Vec<u8>, PhotoError> {
    ensure_valid(bitmap)?;
    let mut cursor = Cursor::new(Vec::new());
    bitmap
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| PhotoError::Encode(format!("PNG: {e}")))?;
    Ok(cursor.into_inner())
}

/// Shrink so the longer side is at most `max_side`; smaller bitmaps pass
/// through untouched.
pub fn downscale_to_limit(bitmap: &DynamicImage, max_side: u32) -> DynamicImage {
    let dims = (bitmap.width(), bitmap.height());
    let (w, h) = fit_within(dims, max_side);
    if (w, h) == dims {
        return bitmap.clone();
    }
    bitmap.resize_exact(w, h, FilterType::Lanczos3)
}

/// Find a JPEG encoding no larger than `target_kb`.
///
/// The bitmap is first shrunk to at most [`MAX_SEARCH_DIMENSION`] on its
/// longer side. Qualities 95, 95−step, … are tried while above 5 and the
/// first encoding within budget is returned. If none fits, the quality-5
/// encoding is returned and the caller decides what to do with an
/// over-budget result (see [`EncodingResult::met_budget`]).
///
/// Deterministic: the same bitmap and parameters give the same bytes.
pub fn encode_under_budget(
    bitmap: &DynamicImage,
    target_kb: f64,
    quality_step: u8,
) -> Result<EncodingResult, PhotoError> {
    encode_under_budget_with_limit(bitmap, target_kb, quality_step, MAX_SEARCH_DIMENSION)
}

/// [`encode_under_budget`] with a configurable pre-search dimension limit.
pub fn encode_under_budget_with_limit(
    bitmap: &DynamicImage,
    target_kb: f64,
    quality_step: u8,
    max_dimension: u32,
) -> Result<EncodingResult, PhotoError> {
    ensure_valid(bitmap)?;
    let working = DynamicImage::ImageRgb8(downscale_to_limit(bitmap, max_dimension).to_rgb8());
    let (width, height) = (working.width(), working.height());

    let mut last = None;
    for quality in quality_schedule(Quality::default(), quality_step) {
        let bytes = encode_jpeg(&working, Quality::new(quality as u32))?;
        let result = EncodingResult {
            size_kb: bytes_to_kb(bytes.len()),
            bytes,
            quality,
            width,
            height,
        };
        if result.met_budget(target_kb) {
            return Ok(result);
        }
        last = Some(result);
    }

    // The schedule always ends at the floor, so `last` holds that encoding.
    last.ok_or_else(|| PhotoError::Encode("empty quality schedule".to_string()))
}
