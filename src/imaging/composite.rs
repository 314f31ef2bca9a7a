//! Compositor: place the segmented subject over a new background.

use super::params::BackgroundStyle;
use super::segment::Segmentation;
use image::{DynamicImage, Rgb, RgbImage, imageops};

/// Blend the subject over the background described by `style`.
///
/// `SolidColor` and `BlurredOriginal` produce opaque RGB; `Transparent`
/// returns the subject RGBA as is. Output dimensions always equal the
/// segmentation's.
pub fn composite(segmentation: &Segmentation, style: &BackgroundStyle) -> DynamicImage {
    match style {
        BackgroundStyle::SolidColor(color) => {
            let (w, h) = segmentation.subject.dimensions();
            let background = RgbImage::from_pixel(w, h, color.rgb());
            DynamicImage::ImageRgb8(blend_over(segmentation, &background))
        }
        BackgroundStyle::BlurredOriginal { radius } => {
            let original = opaque_original(segmentation);
            // A zero radius means no blur at all.
            let background = if *radius > 0.0 {
                imageops::blur(&original, *radius)
            } else {
                original
            };
            DynamicImage::ImageRgb8(blend_over(segmentation, &background))
        }
        BackgroundStyle::Transparent => DynamicImage::ImageRgba8(segmentation.subject.clone()),
    }
}

/// The subject's RGB channels with the mask ignored.
fn opaque_original(segmentation: &Segmentation) -> RgbImage {
    let (w, h) = segmentation.subject.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let p = segmentation.subject.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    })
}

/// Alpha-paste the subject onto `background` using the mask.
fn blend_over(segmentation: &Segmentation, background: &RgbImage) -> RgbImage {
    let mut out = background.clone();
    for ((dst, src), alpha) in out
        .pixels_mut()
        .zip(segmentation.subject.pixels())
        .zip(segmentation.mask.pixels())
    {
        let a = alpha[0] as u32;
        for c in 0..3 {
            let blended = src[c] as u32 * a + dst[c] as u32 * (255 - a);
            dst[c] = ((blended + 127) / 255) as u8;
        }
    }
    out
}
