//! Shared test utilities for the passport-photo test suite.
//!
//! Synthetic bitmaps only: every fixture is generated in memory, so tests
//! need no files on disk and no model weights.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let portrait = red_circle_on_white(1000, 700);
//! let bytes = encode_png_fixture(&portrait);
//! assert_eq!(decode_bitmap(&bytes).unwrap().width(), 1000);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

// =========================================================================
// Bitmaps
// =========================================================================

/// A `width`×`height` RGB bitmap filled with one color.
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Deterministic pseudo-random RGB noise. Same seed, same pixels.
///
/// Noise defeats JPEG compression, which makes it the worst case for the
/// size-constrained encoder.
pub fn noise_rgb(width: u32, height: u32, seed: u64) -> DynamicImage {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        // Knuth MMIX LCG; the high bits are the well-mixed ones.
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 56) as u8
    };
    let mut image = RgbImage::new(width, height);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([next(), next(), next()]);
    }
    DynamicImage::ImageRgb8(image)
}

/// White `size`×`size` square with a centered pure-red disc of `diameter`.
///
/// Stand-in for a portrait on a plain backdrop: the disc is the subject.
pub fn red_circle_on_white(size: u32, diameter: u32) -> DynamicImage {
    let center = size as f64 / 2.0;
    let radius = diameter as f64 / 2.0;
    let image = RgbImage::from_fn(size, size, |x, y| {
        let dx = x as f64 + 0.5 - center;
        let dy = y as f64 + 0.5 - center;
        if dx * dx + dy * dy <= radius * radius {
            Rgb([255, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    });
    DynamicImage::ImageRgb8(image)
}

// =========================================================================
// Encoded fixtures
// =========================================================================

/// Encode a bitmap as PNG bytes, as an upload would arrive.
pub fn encode_png_fixture(bitmap: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    bitmap
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}
