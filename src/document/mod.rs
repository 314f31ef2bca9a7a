//! PDF conversions: bitmap → single-page PDF, and PDF → first-page bitmap.
//!
//! | Operation | Default | Feature |
//! |---|---|---|
//! | Wrap | [`wrap_as_document`]: `lopdf` object model, FlateDecode via `flate2` | none |
//! | Rasterize | [`XObjectRasterizer`]: paints image XObjects through the CTM | `pdfium`: [`PdfiumRasterizer`] |
//!
//! Both directions work at 72 DPI, one pixel per PDF point, and share the
//! [`MAX_PAGE_PIXELS`] limit, so wrapping a bitmap and rasterizing the
//! result gives back the same dimensions.

mod raster;
mod wrap;

#[cfg(feature = "pdfium")]
mod pdfium;

use crate::error::PhotoError;
use image::DynamicImage;
use lopdf::{Document, Object, ObjectId};

pub use raster::{XObjectRasterizer, render_dimensions};
pub use wrap::wrap_as_document;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

/// Rasterization resolution for page extraction.
pub const RENDER_DPI: u32 = 72;

/// PDF points per inch (standard PDF unit).
pub(crate) const POINTS_PER_INCH: f32 = 72.0;

/// Largest page, in pixels, either direction will produce. Bounds memory on
/// absurd MediaBoxes; [`wrap_as_document`] refuses bitmaps above it so every
/// page it writes extracts at full size.
pub const MAX_PAGE_PIXELS: u64 = 100_000_000;

/// Turns the first page of a PDF into a bitmap.
pub trait PageRasterizer: Send + Sync {
    fn first_page(&self, document: &[u8]) -> Result<DynamicImage, PhotoError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Rasterize page 1 of `document` with the built-in renderer.
pub fn extract_first_page(document: &[u8]) -> Result<DynamicImage, PhotoError> {
    XObjectRasterizer.first_page(document)
}

/// Parse PDF bytes, rejecting anything without a `%PDF-` header.
pub(crate) fn load_document(bytes: &[u8]) -> Result<Document, PhotoError> {
    // The header may be preceded by junk, but only within the first 1 KiB.
    let head = &bytes[..bytes.len().min(1024)];
    if !head.windows(5).any(|w| w == b"%PDF-") {
        return Err(PhotoError::UnsupportedDocument(
            "missing %PDF header".to_string(),
        ));
    }
    Document::load_mem(bytes)
        .map_err(|e| PhotoError::UnsupportedDocument(format!("failed to parse PDF: {e}")))
}

pub(crate) fn first_page_id(doc: &Document) -> Result<ObjectId, PhotoError> {
    doc.page_iter()
        .next()
        .ok_or_else(|| PhotoError::UnsupportedDocument("document has no pages".to_string()))
}

/// Resolve a PDF object reference to its target, or return the object as-is.
pub(crate) fn resolve_object<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Numeric operand or array element.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
