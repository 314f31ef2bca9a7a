//! Subject/background separation.
//!
//! The [`Segmenter`] trait hides which model produces the mask. Two
//! implementations exist:
//!
//! | Segmenter | Needs | Approach |
//! |---|---|---|
//! | [`ColorKeySegmenter`] | nothing | backdrop color keyed from the border, flood filled inward |
//! | `U2NetSegmenter` (feature `onnx`) | `u2netp.onnx` / `u2net.onnx` | salient-object network via ONNX Runtime |
//!
//! Both return a [`Segmentation`] whose subject keeps the original RGB and
//! carries the mask as its alpha channel.

use super::bitmap::ensure_valid;
use crate::error::PhotoError;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

#[cfg(feature = "onnx")]
pub use onnx::U2NetSegmenter;

/// Output of a segmenter. `subject` and `mask` always share dimensions.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Original pixels with alpha replaced by the mask.
    pub subject: RgbaImage,
    /// Subject opacity, 0 = background, 255 = subject.
    pub mask: GrayImage,
}

impl Segmentation {
    /// Pair an RGBA bitmap with a mask of the same size, writing the mask
    /// into the alpha channel.
    pub fn new(mut subject: RgbaImage, mask: GrayImage) -> Result<Self, PhotoError> {
        if subject.dimensions() != mask.dimensions() {
            return Err(PhotoError::Model(format!(
                "mask is {}x{} but bitmap is {}x{}",
                mask.width(),
                mask.height(),
                subject.width(),
                subject.height()
            )));
        }
        for (pixel, opacity) in subject.pixels_mut().zip(mask.pixels()) {
            pixel[3] = opacity[0];
        }
        Ok(Self { subject, mask })
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }
}

/// Background-removal model.
///
/// Implementations must be shareable across threads: the engine holds one
/// instance for the whole process and runs requests in parallel.
pub trait Segmenter: Send + Sync {
    fn segment(&self, bitmap: &DynamicImage) -> Result<Segmentation, PhotoError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Pure-Rust segmenter for portraits shot against a plain backdrop.
///
/// The backdrop color is the per-channel median of the border pixels.
/// Starting from the border, a flood fill walks over every pixel whose
/// color distance to the backdrop is below `threshold`; those pixels become
/// background. The last `softness` units below the threshold ramp linearly
/// from transparent to opaque so edges stay smooth. Backdrop-colored
/// pixels enclosed by the subject are not reached and stay opaque.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorKeySegmenter {
    /// Euclidean RGB distance below which a pixel counts as backdrop.
    pub threshold: f32,
    pub softness: f32,
}

impl Default for ColorKeySegmenter {
    fn default() -> Self {
        Self {
            threshold: 48.0,
            softness: 16.0,
        }
    }
}

impl ColorKeySegmenter {
    pub fn new(threshold: f32, softness: f32) -> Self {
        Self {
            threshold: threshold.max(0.0),
            softness: softness.clamp(0.0, threshold.max(0.0)),
        }
    }

    fn mask_for(&self, rgba: &RgbaImage) -> GrayImage {
        let (w, h) = rgba.dimensions();
        let backdrop = border_median(rgba);
        let is_backdrop = |p: &Rgba<u8>| p[3] == 0 || color_distance(p, backdrop) < self.threshold;

        let mut mask = GrayImage::from_pixel(w, h, Luma([255]));
        let mut visited = vec![false; (w as usize) * (h as usize)];
        let index = |x: u32, y: u32| (y as usize) * (w as usize) + x as usize;

        let mut stack: Vec<(u32, u32)> = Vec::new();
        for (x, y) in border_coords(w, h) {
            if !visited[index(x, y)] && is_backdrop(rgba.get_pixel(x, y)) {
                visited[index(x, y)] = true;
                stack.push((x, y));
            }
        }

        while let Some((x, y)) = stack.pop() {
            let pixel = rgba.get_pixel(x, y);
            mask.put_pixel(x, y, Luma([self.opacity(color_distance(pixel, backdrop))]));

            let neighbors = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbors {
                if nx >= w || ny >= h || visited[index(nx, ny)] {
                    continue;
                }
                if is_backdrop(rgba.get_pixel(nx, ny)) {
                    visited[index(nx, ny)] = true;
                    stack.push((nx, ny));
                }
            }
        }

        // Existing transparency in the input is never made more opaque.
        for (m, p) in mask.pixels_mut().zip(rgba.pixels()) {
            m[0] = m[0].min(p[3]);
        }
        mask
    }

    /// Opacity of a flooded pixel at `distance` from the backdrop.
    fn opacity(&self, distance: f32) -> u8 {
        let edge = self.threshold - self.softness;
        if distance <= edge || self.softness <= 0.0 {
            return 0;
        }
        let ramp = ((distance - edge) / self.softness).clamp(0.0, 1.0);
        (ramp * 255.0).round() as u8
    }
}

impl Segmenter for ColorKeySegmenter {
    fn segment(&self, bitmap: &DynamicImage) -> Result<Segmentation, PhotoError> {
        ensure_valid(bitmap)?;
        let rgba = bitmap.to_rgba8();
        let mask = self.mask_for(&rgba);
        Segmentation::new(rgba, mask)
    }

    fn name(&self) -> &'static str {
        "color-key"
    }
}

fn color_distance(p: &Rgba<u8>, backdrop: [f32; 3]) -> f32 {
    (0..3)
        .map(|c| {
            let d = p[c] as f32 - backdrop[c];
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Every pixel on the outer ring, each once.
fn border_coords(w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    let top_bottom = (0..w).flat_map(move |x| {
        if h > 1 {
            vec![(x, 0), (x, h - 1)]
        } else {
            vec![(x, 0)]
        }
    });
    let sides = (1..h.saturating_sub(1)).flat_map(move |y| {
        if w > 1 {
            vec![(0, y), (w - 1, y)]
        } else {
            vec![(0, y)]
        }
    });
    top_bottom.chain(sides)
}

/// Per-channel median of the border pixels.
fn border_median(rgba: &RgbaImage) -> [f32; 3] {
    let (w, h) = rgba.dimensions();
    let mut channels: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for (x, y) in border_coords(w, h) {
        let p = rgba.get_pixel(x, y);
        for (c, values) in channels.iter_mut().enumerate() {
            values.push(p[c]);
        }
    }
    channels.map(|mut values| {
        values.sort_unstable();
        values.get(values.len() / 2).copied().unwrap_or(255) as f32
    })
}

// ═══════════════════════════════════════════════════════════
// U²-Net segmenter, behind the `onnx` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx")]
mod onnx {
    use super::{Segmentation, Segmenter, ensure_valid};
    use crate::error::PhotoError;
    use image::imageops::{self, FilterType};
    use image::{DynamicImage, GrayImage, Luma};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Network input edge length.
    const INPUT_SIZE: u32 = 320;
    const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
    const STD: [f32; 3] = [0.229, 0.224, 0.225];

    /// U²-Net family segmenter (`u2netp.onnx` is the ~4 MB variant).
    ///
    /// `Session::run` needs `&mut self`, so the session sits behind a
    /// `Mutex` and concurrent requests take turns on inference.
    pub struct U2NetSegmenter {
        session: Mutex<Session>,
    }

    impl U2NetSegmenter {
        pub fn load(model_path: &Path) -> Result<Self, PhotoError> {
            if !model_path.exists() {
                return Err(PhotoError::Model(format!(
                    "segmentation model not found: {}",
                    model_path.display()
                )));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| PhotoError::Model(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| PhotoError::Model(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e: ort::Error| PhotoError::Model(format!("ONNX load failed: {e}")))?;

            tracing::info!("U2-Net segmenter loaded from {}", model_path.display());

            Ok(Self {
                session: Mutex::new(session),
            })
        }

        fn predict(&self, bitmap: &DynamicImage) -> Result<GrayImage, PhotoError> {
            use ort::value::TensorRef;

            let rgb = bitmap.to_rgb8();
            let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);

            // Scale by the brightest channel value, then ImageNet normalization.
            let max_value = resized.as_raw().iter().copied().max().unwrap_or(0).max(1) as f32;
            let side = INPUT_SIZE as usize;
            let mut input = ndarray::Array4::<f32>::zeros((1, 3, side, side));
            for (x, y, pixel) in resized.enumerate_pixels() {
                for c in 0..3 {
                    input[[0, c, y as usize, x as usize]] =
                        (pixel[c] as f32 / max_value - MEAN[c]) / STD[c];
                }
            }

            let tensor = TensorRef::from_array_view(&input)
                .map_err(|e| PhotoError::Model(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| PhotoError::Model("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| PhotoError::Model(format!("ONNX inference failed: {e}")))?;

            // First output is the fused saliency map, shape [1, 1, 320, 320]
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| PhotoError::Model(format!("Output extraction: {e}")))?;

            let plane = side * side;
            if data.len() < plane {
                return Err(PhotoError::Model(format!(
                    "Unexpected output shape: {shape:?}, expected [1, 1, {side}, {side}]"
                )));
            }
            let saliency = &data[..plane];

            let (lo, hi) = saliency
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let span = (hi - lo).max(f32::EPSILON);

            let small = GrayImage::from_fn(INPUT_SIZE, INPUT_SIZE, |x, y| {
                let v = saliency[(y as usize) * side + x as usize];
                Luma([(((v - lo) / span) * 255.0).round().clamp(0.0, 255.0) as u8])
            });

            Ok(imageops::resize(
                &small,
                bitmap.width(),
                bitmap.height(),
                FilterType::Lanczos3,
            ))
        }
    }

    impl Segmenter for U2NetSegmenter {
        fn segment(&self, bitmap: &DynamicImage) -> Result<Segmentation, PhotoError> {
            ensure_valid(bitmap)?;
            let mask = self.predict(bitmap)?;
            Segmentation::new(bitmap.to_rgba8(), mask)
        }

        fn name(&self) -> &'static str {
            "u2net"
        }
    }
}
