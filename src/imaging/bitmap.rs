//! Bitmap decoding and validation.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` (pure Rust decoders) |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |

use super::params::BoundingBox;
use crate::error::PhotoError;
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// True when the path carries a `.pdf` extension.
pub fn is_document_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Decode an encoded image (format sniffed from the bytes).
pub fn decode_bitmap(bytes: &[u8]) -> Result<DynamicImage, PhotoError> {
    let bitmap = image::load_from_memory(bytes)
        .map_err(|e| PhotoError::InvalidImage(format!("failed to decode: {e}")))?;
    ensure_valid(&bitmap)?;
    Ok(bitmap)
}

/// Reject bitmaps with a zero dimension.
pub fn ensure_valid(bitmap: &DynamicImage) -> Result<(), PhotoError> {
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Err(PhotoError::InvalidImage(format!(
            "zero-size bitmap ({}x{})",
            bitmap.width(),
            bitmap.height()
        )));
    }
    Ok(())
}

/// Cut the box out of the bitmap.
///
/// A box reaching past the bitmap is clamped; a full-frame box returns a
/// plain copy.
pub fn crop_to_box(bitmap: &DynamicImage, bounds: BoundingBox) -> DynamicImage {
    if bounds.is_full(bitmap.width(), bitmap.height()) {
        return bitmap.clone();
    }
    let x2 = bounds.x2.min(bitmap.width());
    let y2 = bounds.y2.min(bitmap.height());
    let x1 = bounds.x1.min(x2.saturating_sub(1));
    let y1 = bounds.y1.min(y2.saturating_sub(1));
    bitmap.crop_imm(x1, y1, x2 - x1, y2 - y1)
}
