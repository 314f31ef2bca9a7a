//! Normalizer: crop-to-fill into a fixed pixel box.

use super::calculations::centered_fill_crop;
use image::DynamicImage;
use image::imageops::FilterType;

/// Scale and center-crop `bitmap` so it exactly fills
/// `target_width` × `target_height`.
///
/// The centered region with the target's aspect ratio is cut first and
/// resampled with Lanczos3, so the output is always exactly the target
/// size whatever the input shape. Zero target dimensions are raised to 1.
pub fn normalize_to_target(
    bitmap: &DynamicImage,
    target_width: u32,
    target_height: u32,
) -> DynamicImage {
    let (tw, th) = (target_width.max(1), target_height.max(1));
    let (x, y, w, h) = centered_fill_crop((bitmap.width(), bitmap.height()), (tw, th));
    let region = bitmap.crop_imm(x, y, w, h);
    if (w, h) == (tw, th) {
        return region;
    }
    region.resize_exact(tw, th, FilterType::Lanczos3)
}
