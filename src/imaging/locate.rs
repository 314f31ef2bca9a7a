//! Subject locator: where is the face, and what passport crop surrounds it.
//!
//! Face detection is pluggable through [`FaceDetector`]. With no detector,
//! or when the detector finds nothing, the locator returns the full frame;
//! that is the documented fallback, not an error.

use super::calculations::face_crop_box;
use super::params::BoundingBox;
use image::DynamicImage;

#[cfg(feature = "rustface")]
pub use seeta::RustfaceDetector;

/// Bounding box of a detected face within an image.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBounds {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Detection confidence score.
    pub confidence: f64,
}

impl FaceBounds {
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds>;
}

/// Largest face by area. Ties keep the first one reported.
pub fn largest_face(faces: &[FaceBounds]) -> Option<&FaceBounds> {
    faces
        .iter()
        .reduce(|best, face| if face.area() > best.area() { face } else { best })
}

/// Compute the passport crop box for `bitmap`.
///
/// Runs the detector over a grayscale copy, keeps the largest face and
/// builds a 35:45 box 2.5× the face height around it (see
/// [`face_crop_box`]). Zero faces, or no detector, yields the full frame.
pub fn locate_face(bitmap: &DynamicImage, detector: Option<&dyn FaceDetector>) -> BoundingBox {
    let (width, height) = (bitmap.width(), bitmap.height());
    let Some(detector) = detector else {
        return BoundingBox::full(width, height);
    };

    let gray = bitmap.to_luma8();
    let faces = detector.detect(gray.as_raw(), width, height);

    match largest_face(&faces) {
        Some(face) => face_crop_box(
            (
                face.x as i64,
                face.y as i64,
                face.width as i64,
                face.height as i64,
            ),
            (width, height),
        ),
        None => BoundingBox::full(width, height),
    }
}

// ═══════════════════════════════════════════════════════════
// SeetaFace detector, behind the `rustface` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "rustface")]
mod seeta {
    use super::{FaceBounds, FaceDetector};
    use crate::error::PhotoError;
    use rustface::{ImageData, Rectangle};
    use std::io::Cursor;
    use std::path::Path;

    const MIN_FACE_SIZE: u32 = 20;
    const SCORE_THRESHOLD: f64 = 2.0;
    const PYRAMID_SCALE: f32 = 0.8;
    const WINDOW_STEP: u32 = 4;

    /// SeetaFace frontal detector (`seeta_fd_frontal_v1.0.bin`).
    ///
    /// rustface detectors are stateful and not `Sync`, so the model bytes are
    /// kept and a detector is built per call.
    pub struct RustfaceDetector {
        model: Vec<u8>,
    }

    impl RustfaceDetector {
        pub fn load(model_path: &Path) -> Result<Self, PhotoError> {
            let model = std::fs::read(model_path).map_err(|e| {
                PhotoError::Model(format!(
                    "face model not readable: {}: {e}",
                    model_path.display()
                ))
            })?;
            // Parse once up front so a bad file fails at startup.
            rustface::read_model(Cursor::new(&model))
                .map_err(|e| PhotoError::Model(format!("invalid face model: {e}")))?;
            tracing::info!("SeetaFace detector loaded from {}", model_path.display());
            Ok(Self { model })
        }
    }

    impl FaceDetector for RustfaceDetector {
        fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds> {
            let Ok(model) = rustface::read_model(Cursor::new(&self.model)) else {
                return Vec::new();
            };
            let mut detector = rustface::create_detector_with_model(model);
            detector.set_min_face_size(MIN_FACE_SIZE);
            detector.set_score_thresh(SCORE_THRESHOLD);
            detector.set_pyramid_scale_factor(PYRAMID_SCALE);
            detector.set_slide_window_step(WINDOW_STEP, WINDOW_STEP);

            let mut image = ImageData::new(gray, width, height);
            detector
                .detect(&mut image)
                .into_iter()
                .map(|face| to_face_bounds(face.bbox(), face.score()))
                .collect()
        }
    }

    /// SeetaFace boxes may start off-frame; the crop geometry clamps later.
    fn to_face_bounds(bbox: &Rectangle, score: f64) -> FaceBounds {
        FaceBounds {
            x: bbox.x() as f64,
            y: bbox.y() as f64,
            width: bbox.width() as f64,
            height: bbox.height() as f64,
            confidence: score,
        }
    }

}
