//! # passport-photo
//!
//! Turns an ordinary photo into a print-ready passport photo, plus a handful
//! of everyday document chores: background removal and replacement, portrait
//! blur, size-capped JPEG compression, image ↔ PDF, and QR codes.
//!
//! # Architecture: Pure Stage Chain
//!
//! A passport photo is five independent stages, each a pure function from a
//! bitmap (plus parameters) to a new bitmap or encoded bytes:
//!
//! ```text
//! 1. Segment    bitmap  →  subject + mask    (who is in front)
//! 2. Locate     bitmap  →  crop box          (where the face is)
//! 3. Composite  subject →  flattened bitmap  (what goes behind)
//! 4. Normalize  bitmap  →  413×531 bitmap    (exact print size)
//! 5. Encode     bitmap  →  JPEG ≤ budget     (upload size limit)
//! ```
//!
//! No stage holds state between calls, so every stage is unit-tested on
//! synthetic bitmaps without model files. The [`tools`] layer wires stages
//! together per request and owns the only shared resources (the models).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | The stages: segment, locate, composite, normalize, size-constrained encode |
//! | [`document`] | Bitmap → single-page PDF, PDF → first-page bitmap |
//! | [`qr`] | Text → QR code bitmap |
//! | [`tools`] | `ToolRequest` dispatch, the shared [`tools::Engine`], parallel batches |
//! | [`config`] | `passport-photo.toml` loading, validation and merging |
//! | [`error`] | [`error::PhotoError`], shared by every stage |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Runs Without Model Files
//!
//! The default build needs no model files: segmentation keys out the
//! backdrop color and faces are not detected (crops use the full frame).
//! PDF pages go through PDFium when its shared library can be bound at
//! runtime; otherwise the built-in renderer paints the page's image
//! XObjects and refuses pages it cannot draw. Heavier backends are cargo
//! features that slot in behind the same traits:
//!
//! | Feature | Default | Replaces | With |
//! |---|---|---|---|
//! | `onnx` | off | color-key segmentation | U²-Net through ONNX Runtime |
//! | `rustface` | off | full-frame crop | SeetaFace frontal face detector |
//! | `pdfium` | on | built-in page renderer | PDFium, when the library loads |
//!
//! ## Best-Effort Size Budget
//!
//! The compressor walks JPEG quality down from 95 and stops at the first
//! encoding within budget. When even quality 5 is too large it still returns
//! that encoding; [`imaging::EncodingResult::met_budget`] tells the caller.
//! There is no "budget unreachable" error.
//!
//! ## One Engine, Many Requests
//!
//! Model weights are loaded once into a [`tools::Engine`] that is `Send +
//! Sync` and immutable. A batch of requests shares it across the rayon pool
//! via [`tools::run_all`].

pub mod config;
pub mod document;
pub mod error;
pub mod imaging;
pub mod output;
pub mod qr;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_helpers;
