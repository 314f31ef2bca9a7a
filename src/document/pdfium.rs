//! PDFium-backed page rasterizer for arbitrary PDF content.
//!
//! `PdfiumRasterizer` is stateless (`Send + Sync`). Each call creates a
//! fresh `Pdfium` instance because the upstream type is `!Send`; the OS
//! caches the `dlopen`, so repeat loads are cheap.

use super::{PageRasterizer, RENDER_DPI, render_dimensions};
use crate::error::PhotoError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

pub struct PdfiumRasterizer;

impl PdfiumRasterizer {
    /// Create a rasterizer, verifying the PDFium library is loadable.
    ///
    /// Discovery order:
    /// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to library file)
    /// 2. Alongside the running executable
    /// 3. System library search paths
    pub fn new() -> Result<Self, PhotoError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

fn load_pdfium() -> Result<Pdfium, PhotoError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| PhotoError::Model(format!("Failed to load PDFium from {path}: {e}")))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %exe_dir.display(), "Loaded PDFium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        PhotoError::Model(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

impl PageRasterizer for PdfiumRasterizer {
    fn first_page(&self, document: &[u8]) -> Result<DynamicImage, PhotoError> {
        let pdfium = load_pdfium()?;
        let pdf = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| PhotoError::UnsupportedDocument(format!("Failed to load PDF: {e}")))?;

        let pages = pdf.pages();
        let page = pages
            .get(0)
            .map_err(|_| PhotoError::UnsupportedDocument("document has no pages".to_string()))?;

        let (width, height) =
            render_dimensions(page.width().value, page.height().value, RENDER_DPI)?;
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PhotoError::UnsupportedDocument(format!("Rendering failed: {e}")))?;

        Ok(DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8()))
    }

    fn name(&self) -> &'static str {
        "pdfium"
    }
}
