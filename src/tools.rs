//! Tool dispatch: one request in, one encoded file out.
//!
//! Shells (the CLI here) decode their input into a [`ToolInput`], pick a
//! [`Tool`], and hand the [`ToolRequest`] to an [`Engine`]. The engine owns
//! the shared model instances and runs the stage chain the tool needs:
//!
//! ```text
//! Passport:   segment → locate → composite(solid) → crop → normalize → encode
//! RemoveBg:   segment → composite(transparent) → PNG
//! Background: segment → composite(solid) → JPEG
//! Blur:       segment → composite(blurred) → JPEG
//! Compress:   size-constrained JPEG search
//! Convert:    JPEG
//! PdfCreate:  bitmap → single-page PDF
//! PdfToImage: PDF → first page → JPEG
//! Qr:         text → QR code PNG
//! ```
//!
//! The engine is immutable after [`EngineBuilder::build`] and `Send + Sync`,
//! so one instance serves every request; [`run_all`] fans a batch out over
//! the rayon pool.

use crate::config::PipelineConfig;
use crate::document::{PageRasterizer, XObjectRasterizer, wrap_as_document};
use crate::error::PhotoError;
use crate::imaging::{
    BackgroundColor, BackgroundStyle, ColorKeySegmenter, EncodingResult, FaceDetector, Quality,
    Segmenter, TargetSize, composite, crop_to_box, encode_jpeg, encode_png,
    encode_under_budget_with_limit, locate_face, normalize_to_target,
};
use crate::qr::encode_qr;
use image::DynamicImage;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

pub const JPEG: &str = "image/jpeg";
pub const PNG: &str = "image/png";
pub const PDF: &str = "application/pdf";

/// Request payload, already classified by the shell.
#[derive(Debug, Clone)]
pub enum ToolInput {
    Bitmap(DynamicImage),
    /// Raw PDF bytes.
    Document(Vec<u8>),
    Text(String),
}

impl ToolInput {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolInput::Bitmap(_) => "bitmap",
            ToolInput::Document(_) => "document",
            ToolInput::Text(_) => "text",
        }
    }
}

/// Transform to apply, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Tool {
    /// `hd` skips the size budget and encodes at the HD quality.
    Passport { hd: bool },
    RemoveBackground,
    /// Color name or `#rrggbb`; unknown names mean white.
    Background { color: String },
    Blur,
    Compress { target_kb: f64 },
    Convert,
    PdfCreate,
    PdfToImage,
    Qr,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Passport { .. } => "passport",
            Tool::RemoveBackground => "remove-bg",
            Tool::Background { .. } => "background",
            Tool::Blur => "blur",
            Tool::Compress { .. } => "compress",
            Tool::Convert => "convert",
            Tool::PdfCreate => "pdf",
            Tool::PdfToImage => "pdf-to-image",
            Tool::Qr => "qr",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub input: ToolInput,
    pub tool: Tool,
}

impl ToolRequest {
    pub fn new(input: ToolInput, tool: Tool) -> Self {
        Self { input, tool }
    }
}

/// Encoded result plus what a shell needs to deliver it.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
    /// Present when the size-constrained encoder produced `bytes`.
    pub encoding: Option<EncodingResult>,
}

impl ToolOutput {
    fn new(bytes: Vec<u8>, file_name: impl Into<String>, content_type: &'static str) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type,
            encoding: None,
        }
    }

    fn encoded(result: EncodingResult, file_name: impl Into<String>) -> Self {
        Self {
            bytes: result.bytes.clone(),
            file_name: file_name.into(),
            content_type: JPEG,
            encoding: Some(result),
        }
    }
}

/// Numeric knobs the tools read. Built from [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub target: TargetSize,
    pub budget_kb: f64,
    pub hd_quality: Quality,
    pub passport_background: BackgroundColor,
    pub blur_radius: f32,
    pub quality_step: u8,
    pub max_dimension: u32,
    pub jpeg_quality: Quality,
    pub blur_quality: Quality,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for EngineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            target: TargetSize::new(config.passport.width, config.passport.height),
            budget_kb: config.passport.budget_kb,
            hd_quality: Quality::new(config.passport.hd_quality),
            passport_background: BackgroundColor::from_name(&config.background.default_color),
            blur_radius: config.background.blur_radius,
            quality_step: config.compress.quality_step,
            max_dimension: config.compress.max_dimension,
            jpeg_quality: Quality::new(config.output.jpeg_quality),
            blur_quality: Quality::new(config.output.blur_quality),
        }
    }
}

/// Shared service object: models plus settings.
pub struct Engine {
    segmenter: Arc<dyn Segmenter>,
    detector: Option<Arc<dyn FaceDetector>>,
    rasterizer: Arc<dyn PageRasterizer>,
    settings: EngineSettings,
}

#[derive(Default)]
pub struct EngineBuilder {
    segmenter: Option<Arc<dyn Segmenter>>,
    detector: Option<Arc<dyn FaceDetector>>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    settings: EngineSettings,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn face_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Missing pieces fall back to the pure-Rust defaults: color-key
    /// segmentation, no face detector, image-XObject page rendering.
    pub fn build(self) -> Engine {
        Engine {
            segmenter: self
                .segmenter
                .unwrap_or_else(|| Arc::new(ColorKeySegmenter::default())),
            detector: self.detector,
            rasterizer: self.rasterizer.unwrap_or_else(|| Arc::new(XObjectRasterizer)),
            settings: self.settings,
        }
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Build an engine from config, loading any configured model files.
    ///
    /// A model path whose backend feature is compiled out is ignored with a
    /// warning; a model that fails to load is an error.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PhotoError> {
        let mut builder = EngineBuilder::new().settings(EngineSettings::from(config));
        if let Some(segmenter) = backends::segmenter(config)? {
            builder = builder.segmenter(segmenter);
        }
        match backends::face_detector(config)? {
            Some(detector) => builder = builder.face_detector(detector),
            None => tracing::info!("no face detector loaded; passport crops use the full frame"),
        }
        if let Some(rasterizer) = backends::rasterizer() {
            builder = builder.rasterizer(rasterizer);
        }
        Ok(builder.build())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Backend names, for diagnostics.
    pub fn describe(&self) -> (&'static str, bool, &'static str) {
        (
            self.segmenter.name(),
            self.detector.is_some(),
            self.rasterizer.name(),
        )
    }

    /// Run one request to completion.
    pub fn run(&self, request: ToolRequest) -> Result<ToolOutput, PhotoError> {
        let ToolRequest { input, tool } = request;
        debug!(tool = tool.name(), input = input.kind(), "running tool");

        let output = match &tool {
            Tool::Passport { hd } => self.passport(expect_bitmap(&tool, &input)?, *hd),
            Tool::RemoveBackground => self.remove_background(expect_bitmap(&tool, &input)?),
            Tool::Background { color } => {
                self.background(expect_bitmap(&tool, &input)?, color)
            }
            Tool::Blur => self.blur(expect_bitmap(&tool, &input)?),
            Tool::Compress { target_kb } => {
                self.compress(expect_bitmap(&tool, &input)?, *target_kb)
            }
            Tool::Convert => {
                let bytes = encode_jpeg(expect_bitmap(&tool, &input)?, self.settings.jpeg_quality)?;
                Ok(ToolOutput::new(bytes, "converted.jpg", JPEG))
            }
            Tool::PdfCreate => {
                let bytes = wrap_as_document(expect_bitmap(&tool, &input)?)?;
                Ok(ToolOutput::new(bytes, "doc.pdf", PDF))
            }
            Tool::PdfToImage => self.pdf_to_image(&tool, &input),
            Tool::Qr => self.qr(&tool, &input),
        }?;

        debug!(
            tool = tool.name(),
            file = %output.file_name,
            bytes = output.bytes.len(),
            "tool finished"
        );
        Ok(output)
    }

    fn passport(&self, bitmap: &DynamicImage, hd: bool) -> Result<ToolOutput, PhotoError> {
        let segmentation = self.segmenter.segment(bitmap)?;
        let bounds = locate_face(bitmap, self.detector.as_deref());
        debug!(
            x1 = bounds.x1,
            y1 = bounds.y1,
            x2 = bounds.x2,
            y2 = bounds.y2,
            full_frame = bounds.is_full(bitmap.width(), bitmap.height()),
            "passport crop"
        );

        let flattened = composite(
            &segmentation,
            &BackgroundStyle::SolidColor(self.settings.passport_background),
        );
        let cropped = crop_to_box(&flattened, bounds);
        let TargetSize { width, height } = self.settings.target;
        let normalized = normalize_to_target(&cropped, width, height);

        if hd {
            let bytes = encode_jpeg(&normalized, self.settings.hd_quality)?;
            return Ok(ToolOutput::new(bytes, "passport_hd.jpg", JPEG));
        }

        let result = encode_under_budget_with_limit(
            &normalized,
            self.settings.budget_kb,
            self.settings.quality_step,
            self.settings.max_dimension,
        )?;
        debug!(
            quality = result.quality,
            size_kb = result.size_kb,
            met_budget = result.met_budget(self.settings.budget_kb),
            "passport encoded"
        );
        Ok(ToolOutput::encoded(result, "passport_compressed.jpg"))
    }

    fn remove_background(&self, bitmap: &DynamicImage) -> Result<ToolOutput, PhotoError> {
        let segmentation = self.segmenter.segment(bitmap)?;
        let cutout = composite(&segmentation, &BackgroundStyle::Transparent);
        Ok(ToolOutput::new(encode_png(&cutout)?, "no_bg.png", PNG))
    }

    fn background(&self, bitmap: &DynamicImage, color: &str) -> Result<ToolOutput, PhotoError> {
        let segmentation = self.segmenter.segment(bitmap)?;
        let fill = BackgroundColor::from_name(color);
        let flattened = composite(&segmentation, &BackgroundStyle::SolidColor(fill));
        let bytes = encode_jpeg(&flattened, self.settings.jpeg_quality)?;
        Ok(ToolOutput::new(bytes, background_file_name(color), JPEG))
    }

    fn blur(&self, bitmap: &DynamicImage) -> Result<ToolOutput, PhotoError> {
        let segmentation = self.segmenter.segment(bitmap)?;
        let style = BackgroundStyle::BlurredOriginal {
            radius: self.settings.blur_radius,
        };
        let blurred = composite(&segmentation, &style);
        let bytes = encode_jpeg(&blurred, self.settings.blur_quality)?;
        Ok(ToolOutput::new(bytes, "portrait_blur.jpg", JPEG))
    }

    fn compress(&self, bitmap: &DynamicImage, target_kb: f64) -> Result<ToolOutput, PhotoError> {
        let result = encode_under_budget_with_limit(
            bitmap,
            target_kb,
            self.settings.quality_step,
            self.settings.max_dimension,
        )?;
        debug!(
            target_kb,
            quality = result.quality,
            size_kb = result.size_kb,
            "compressed"
        );
        Ok(ToolOutput::encoded(result, "compressed.jpg"))
    }

    fn pdf_to_image(&self, tool: &Tool, input: &ToolInput) -> Result<ToolOutput, PhotoError> {
        let ToolInput::Document(bytes) = input else {
            return Err(mismatch(tool, "document"));
        };
        let page = self.rasterizer.first_page(bytes)?;
        debug!(
            rasterizer = self.rasterizer.name(),
            width = page.width(),
            height = page.height(),
            "page rasterized"
        );
        let bytes = encode_jpeg(&page, self.settings.jpeg_quality)?;
        Ok(ToolOutput::new(bytes, "page_1.jpg", JPEG))
    }

    fn qr(&self, tool: &Tool, input: &ToolInput) -> Result<ToolOutput, PhotoError> {
        let ToolInput::Text(text) = input else {
            return Err(mismatch(tool, "text"));
        };
        let code = DynamicImage::ImageLuma8(encode_qr(text)?);
        Ok(ToolOutput::new(encode_png(&code)?, "qrcode.png", PNG))
    }
}

/// Run every request on the rayon pool. Results keep request order.
pub fn run_all(
    engine: &Engine,
    requests: Vec<ToolRequest>,
) -> Vec<Result<ToolOutput, PhotoError>> {
    requests
        .into_par_iter()
        .map(|request| engine.run(request))
        .collect()
}

fn expect_bitmap<'a>(tool: &Tool, input: &'a ToolInput) -> Result<&'a DynamicImage, PhotoError> {
    match input {
        ToolInput::Bitmap(bitmap) => Ok(bitmap),
        _ => Err(mismatch(tool, "bitmap")),
    }
}

fn mismatch(tool: &Tool, expected: &'static str) -> PhotoError {
    PhotoError::InputMismatch {
        tool: tool.name(),
        expected,
    }
}

/// `bg_{color}.jpg`, keeping only ASCII alphanumerics of the color so the
/// name is always a safe file name.
pub fn background_file_name(color: &str) -> String {
    let slug: String = color
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if slug.is_empty() {
        "bg_white.jpg".to_string()
    } else {
        format!("bg_{slug}.jpg")
    }
}

/// Parse a human size like `50kb`, `2mb` or `1.5 MB` into kilobytes.
///
/// A number (digits, optional fraction), optional whitespace, then `kb` or
/// `mb`, case-insensitive. Text after the unit is ignored. Returns `None`
/// for anything else.
pub fn parse_size(text: &str) -> Option<f64> {
    let text = text.trim().to_ascii_lowercase();
    let int_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if int_end == 0 {
        return None;
    }

    let mut number_end = int_end;
    if let Some(fraction) = text[int_end..].strip_prefix('.') {
        let digits = fraction
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(fraction.len());
        // "5." without digits is not a number followed by a unit.
        if digits == 0 {
            return None;
        }
        number_end = int_end + 1 + digits;
    }

    let value: f64 = text[..number_end].parse().ok()?;
    let unit = text[number_end..].trim_start();
    if unit.starts_with("kb") {
        Some(value)
    } else if unit.starts_with("mb") {
        Some(value * 1024.0)
    } else {
        None
    }
}

/// Optional heavy backends, resolved at engine construction.
mod backends {
    use super::*;

    #[cfg(feature = "onnx")]
    pub fn segmenter(config: &PipelineConfig) -> Result<Option<Arc<dyn Segmenter>>, PhotoError> {
        use crate::imaging::U2NetSegmenter;
        match &config.models.segmentation {
            Some(path) => Ok(Some(Arc::new(U2NetSegmenter::load(path)?))),
            None => Ok(None),
        }
    }

    #[cfg(not(feature = "onnx"))]
    pub fn segmenter(config: &PipelineConfig) -> Result<Option<Arc<dyn Segmenter>>, PhotoError> {
        if let Some(path) = &config.models.segmentation {
            tracing::warn!(
                path = %path.display(),
                "segmentation model configured but built without the `onnx` feature; using color-key segmentation"
            );
        }
        Ok(None)
    }

    #[cfg(feature = "rustface")]
    pub fn face_detector(
        config: &PipelineConfig,
    ) -> Result<Option<Arc<dyn FaceDetector>>, PhotoError> {
        use crate::imaging::RustfaceDetector;
        match &config.models.face_detector {
            Some(path) => Ok(Some(Arc::new(RustfaceDetector::load(path)?))),
            None => Ok(None),
        }
    }

    #[cfg(not(feature = "rustface"))]
    pub fn face_detector(
        config: &PipelineConfig,
    ) -> Result<Option<Arc<dyn FaceDetector>>, PhotoError> {
        if let Some(path) = &config.models.face_detector {
            tracing::warn!(
                path = %path.display(),
                "face model configured but built without the `rustface` feature; crops use the full frame"
            );
        }
        Ok(None)
    }

    /// PDFium when its library loads, otherwise the built-in renderer.
    #[cfg(feature = "pdfium")]
    pub fn rasterizer() -> Option<Arc<dyn PageRasterizer>> {
        use crate::document::PdfiumRasterizer;
        match PdfiumRasterizer::new() {
            Ok(rasterizer) => Some(Arc::new(rasterizer)),
            Err(e) => {
                tracing::info!(error = %e, "PDFium unavailable; using built-in page renderer");
                None
            }
        }
    }

    #[cfg(not(feature = "pdfium"))]
    pub fn rasterizer() -> Option<Arc<dyn PageRasterizer>> {
        None
    }
}
