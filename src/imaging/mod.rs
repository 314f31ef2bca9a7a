//! Pixel pipeline. Pure Rust by default, model backends behind features.
//!
//! | Stage | Function | Crate / technique |
//! |---|---|---|
//! | **Segment** | [`Segmenter::segment`] | color key + flood fill, or U²-Net via `ort` |
//! | **Locate** | [`locate_face`] | [`FaceDetector`] (SeetaFace via `rustface`) + crop geometry |
//! | **Composite** | [`composite`] | alpha blend, `imageops::blur` |
//! | **Normalize** | [`normalize_to_target`] | centered crop + Lanczos3 |
//! | **Encode** | [`encode_under_budget`] | `JpegEncoder` quality search |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry and the quality schedule (unit testable)
//! - **Parameters**: Value types describing what a stage should produce
//! - **Stages**: One module per pipeline stage, each a pure bitmap → bitmap step
//!
//! Stages do no logging and hold no state between calls.

pub mod bitmap;
mod calculations;
pub mod composite;
pub mod encode;
pub mod locate;
pub mod normalize;
mod params;
pub mod segment;

pub use bitmap::{
    crop_to_box, decode_bitmap, ensure_valid, is_document_path, supported_input_extensions,
};
pub use calculations::{centered_fill_crop, face_crop_box, fit_within, quality_schedule};
pub use composite::composite;
pub use encode::{
    DEFAULT_QUALITY_STEP, EncodingResult, MAX_SEARCH_DIMENSION, encode_jpeg, encode_png,
    encode_under_budget, encode_under_budget_with_limit,
};
pub use locate::{FaceBounds, FaceDetector, largest_face, locate_face};
pub use normalize::normalize_to_target;
pub use params::{BackgroundColor, BackgroundStyle, BoundingBox, Quality, TargetSize};
pub use segment::{ColorKeySegmenter, Segmentation, Segmenter};

#[cfg(feature = "rustface")]
pub use locate::RustfaceDetector;
#[cfg(feature = "onnx")]
pub use segment::U2NetSegmenter;
