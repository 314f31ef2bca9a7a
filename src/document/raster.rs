//! Built-in page rasterizer.
//!
//! Renders the page as a white MediaBox canvas and paints every image
//! XObject the content stream draws, following `q`/`Q`/`cm`/`Do` and nested
//! form XObjects. Text, vector paths and shadings are not drawn; scanned
//! pages and image-only PDFs (including everything [`wrap_as_document`]
//! writes) render faithfully. A page whose only marks are undrawable is
//! rejected instead of coming back blank; a page mixing both renders its
//! images with a warning.
//!
//! Image streams: FlateDecode (with PNG predictors), DCTDecode, or
//! unfiltered, 8 bits per component, DeviceGray / DeviceRGB / DeviceCMYK
//! (or ICCBased with 1, 3 or 4 components). Other images are skipped.
//!
//! [`wrap_as_document`]: super::wrap_as_document

use super::{
    MAX_PAGE_PIXELS, POINTS_PER_INCH, PageRasterizer, RENDER_DPI, first_page_id, load_document,
    number, resolve_object,
};
use crate::error::PhotoError;
use flate2::read::ZlibDecoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Read;
use tracing::warn;

/// US Letter, used when a page has no MediaBox anywhere in its tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Form XObjects nested deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

/// Page tree levels searched for inherited attributes.
const MAX_TREE_DEPTH: usize = 32;

/// Operators that put text, paths, shadings or inline images on the page.
const UNDRAWN_OPERATORS: &[&str] = &[
    "Tj", "TJ", "'", "\"", "S", "s", "f", "F", "f*", "B", "B*", "b", "b*", "sh", "BI", "EI",
];

/// Pure-Rust rasterizer for image-based PDF pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct XObjectRasterizer;

impl PageRasterizer for XObjectRasterizer {
    fn first_page(&self, document: &[u8]) -> Result<DynamicImage, PhotoError> {
        let doc = load_document(document)?;
        let page_id = first_page_id(&doc)?;
        render_page(&doc, page_id, RENDER_DPI).map(DynamicImage::ImageRgb8)
    }

    fn name(&self) -> &'static str {
        "xobject"
    }
}

/// Compute pixel dimensions for rendering a page of the given size.
///
/// Returns (width_px, height_px), rounded and at least 1. Pages larger than
/// [`MAX_PAGE_PIXELS`] are rejected rather than shrunk, so the output always
/// matches the page at `dpi`.
pub fn render_dimensions(
    width_points: f32,
    height_points: f32,
    dpi: u32,
) -> Result<(u32, u32), PhotoError> {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let width = (width_points * scale).round().max(1.0) as u64;
    let height = (height_points * scale).round().max(1.0) as u64;

    if width.saturating_mul(height) > MAX_PAGE_PIXELS {
        return Err(PhotoError::UnsupportedDocument(format!(
            "page renders to {width}x{height} px, above the {MAX_PAGE_PIXELS} pixel limit"
        )));
    }
    Ok((width as u32, height as u32))
}

fn render_page(doc: &Document, page_id: ObjectId, dpi: u32) -> Result<RgbImage, PhotoError> {
    let [llx, lly, urx, ury] = media_box(doc, page_id);
    let (width_pt, height_pt) = ((urx - llx).max(1.0), (ury - lly).max(1.0));
    let (width, height) = render_dimensions(width_pt, height_pt, dpi)?;

    // User space → device pixels: scale, then flip y so the top is row 0.
    let sx = width as f32 / width_pt;
    let sy = height as f32 / height_pt;
    let base = Matrix {
        a: sx,
        b: 0.0,
        c: 0.0,
        d: -sy,
        e: -llx * sx,
        f: ury * sy,
    };

    let resources = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok());
    let content = doc
        .get_page_content(page_id)
        .map_err(|e| PhotoError::UnsupportedDocument(format!("unreadable page content: {e}")))?;

    let mut painter = Painter {
        doc,
        canvas: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        images: 0,
        undrawn: 0,
    };
    painter.run(&content, resources, base, 0)?;

    if painter.undrawn > 0 {
        if painter.images == 0 {
            return Err(PhotoError::UnsupportedDocument(
                "page holds only text or vector content, which the built-in renderer \
                 cannot draw; install PDFium to render it"
                    .to_string(),
            ));
        }
        warn!(
            operators = painter.undrawn,
            "text and vector content left out of the rendered page"
        );
    }
    Ok(painter.canvas)
}

/// Page attribute, searched up the page tree when not set on the page.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(resolve_object(doc, value));
        }
        let parent = dict.get(b"Parent").ok()?;
        dict = resolve_object(doc, parent).as_dict().ok()?;
    }
    None
}

/// `[llx, lly, urx, ury]` with corners normalized.
fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values: Option<Vec<f32>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .map(|arr| {
            arr.iter()
                .filter_map(|o| number(resolve_object(doc, o)))
                .collect()
        });
    match values.as_deref() {
        Some(&[x1, y1, x2, y2]) => [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Affine transform `[a b c d e f]`, mapping `(x, y)` to
/// `(a·x + c·y + e, b·x + d·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let n: Vec<f32> = operands.iter().filter_map(number).collect();
        match n.as_slice() {
            &[a, b, c, d, e, f] => Some(Matrix { a, b, c, d, e, f }),
            _ => None,
        }
    }

    /// Concatenate: apply `self` first, then `outer` (PDF `cm` semantics).
    fn then(&self, outer: &Matrix) -> Matrix {
        Matrix {
            a: self.a * outer.a + self.b * outer.c,
            b: self.a * outer.b + self.b * outer.d,
            c: self.c * outer.a + self.d * outer.c,
            d: self.c * outer.b + self.d * outer.d,
            e: self.e * outer.a + self.f * outer.c + outer.e,
            f: self.e * outer.b + self.f * outer.d + outer.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn apply_inverse(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let (dx, dy) = (x - self.e, y - self.f);
        Some((
            (self.d * dx - self.c * dy) / det,
            (self.a * dy - self.b * dx) / det,
        ))
    }
}

struct Painter<'a> {
    doc: &'a Document,
    canvas: RgbImage,
    /// Image XObjects painted.
    images: usize,
    /// Painting operators the renderer skipped.
    undrawn: usize,
}

impl<'a> Painter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        depth: usize,
    ) -> Result<(), PhotoError> {
        let content = Content::decode(content)
            .map_err(|e| PhotoError::UnsupportedDocument(format!("bad content stream: {e}")))?;

        let mut ctm = base;
        let mut saved = Vec::new();
        for op in &content.operations {
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => {
                    if let Some(m) = saved.pop() {
                        ctm = m;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&op.operands) {
                        ctm = m.then(&ctm);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.draw_xobject(name, resources, ctm, depth)?;
                    }
                }
                other if UNDRAWN_OPERATORS.contains(&other) => self.undrawn += 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn draw_xobject(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
        depth: usize,
    ) -> Result<(), PhotoError> {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve_object(doc, x).as_dict().ok())
            .and_then(|x| x.get(name).ok())
            .and_then(|o| resolve_object(doc, o).as_stream().ok())
        else {
            return Ok(());
        };

        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(n)) if n == b"Image" => {
                if let Some(image) = decode_image(doc, stream) {
                    self.paint(&image, &ctm);
                    self.images += 1;
                }
                Ok(())
            }
            Ok(Object::Name(n)) if n == b"Form" && depth < MAX_FORM_DEPTH => {
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| resolve_object(doc, m).as_array().ok())
                    .and_then(|m| Matrix::from_operands(m))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve_object(doc, r).as_dict().ok())
                    .or(resources);
                let Some(content) = stream_data(stream) else {
                    return Ok(());
                };
                self.run(&content, form_resources, matrix.then(&ctm), depth + 1)
            }
            _ => Ok(()),
        }
    }

    /// Map the image's unit square through `ctm` and fill the covered
    /// device pixels by nearest-neighbor sampling.
    fn paint(&mut self, image: &RgbImage, ctm: &Matrix) {
        let (iw, ih) = image.dimensions();
        let (cw, ch) = self.canvas.dimensions();

        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(u, v)| ctm.apply(u, v));
        let min_x = corners.iter().map(|p| p.0).fold(f32::MAX, f32::min);
        let max_x = corners.iter().map(|p| p.0).fold(f32::MIN, f32::max);
        let min_y = corners.iter().map(|p| p.1).fold(f32::MAX, f32::min);
        let max_y = corners.iter().map(|p| p.1).fold(f32::MIN, f32::max);

        if ctm.apply_inverse(0.0, 0.0).is_none() {
            // Degenerate CTM: the image collapses to a line.
            return;
        }
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(cw);
        let y1 = (max_y.ceil().max(0.0) as u32).min(ch);

        for py in y0..y1 {
            for px in x0..x1 {
                let Some((u, v)) = ctm.apply_inverse(px as f32 + 0.5, py as f32 + 0.5) else {
                    continue;
                };
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                // Image row 0 sits at the top of the unit square (v = 1).
                let ix = ((u * iw as f32) as u32).min(iw - 1);
                let iy = (((1.0 - v) * ih as f32) as u32).min(ih - 1);
                self.canvas.put_pixel(px, py, *image.get_pixel(ix, iy));
            }
        }
    }
}

/// Filter names in application order.
fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| match f {
                Object::Name(n) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).ok()?;
    Some(decoded)
}

/// Stream content with FlateDecode undone. `None` for other filters.
fn stream_data(stream: &Stream) -> Option<Vec<u8>> {
    let mut data = stream.content.clone();
    for filter in filters(stream) {
        match filter.as_slice() {
            b"FlateDecode" | b"Fl" => data = inflate(&data)?,
            _ => return None,
        }
    }
    Some(data)
}

fn dict_int(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve_object(doc, o).as_i64().ok())
}

/// Decode an image XObject to RGB, or `None` when unsupported.
fn decode_image(doc: &Document, stream: &Stream) -> Option<RgbImage> {
    let dict = &stream.dict;
    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return None;
    }

    let filters = filters(stream);
    if filters.last().is_some_and(|f| f == b"DCTDecode" || f == b"DCT") {
        let mut data = stream.content.clone();
        for filter in &filters[..filters.len() - 1] {
            match filter.as_slice() {
                b"FlateDecode" | b"Fl" => data = inflate(&data)?,
                _ => return None,
            }
        }
        return image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
            .ok()
            .map(|img| img.to_rgb8());
    }

    let width = u32::try_from(dict_int(doc, dict, b"Width")?).ok()?;
    let height = u32::try_from(dict_int(doc, dict, b"Height")?).ok()?;
    if width == 0 || height == 0 || dict_int(doc, dict, b"BitsPerComponent").unwrap_or(8) != 8 {
        return None;
    }
    let channels = color_channels(doc, dict)?;

    let mut data = stream_data(stream)?;
    let params = dict
        .get(b"DecodeParms")
        .ok()
        .and_then(|p| resolve_object(doc, p).as_dict().ok());
    if let Some(params) = params {
        if dict_int(doc, params, b"Predictor").unwrap_or(1) >= 10 {
            data = undo_png_predictor(&data, width as usize * channels, channels)?;
        }
    }

    let expected = width as usize * height as usize * channels;
    if data.len() < expected {
        return None;
    }
    let pixels = &data[..expected];

    let rgb: Vec<u8> = match channels {
        1 => pixels.iter().flat_map(|&v| [v, v, v]).collect(),
        3 => pixels.to_vec(),
        _ => pixels
            .chunks_exact(4)
            .flat_map(|cmyk| {
                let k = 255 - cmyk[3] as u32;
                [0, 1, 2].map(|i| ((255 - cmyk[i] as u32) * k / 255) as u8)
            })
            .collect(),
    };
    RgbImage::from_raw(width, height, rgb)
}

/// Components per pixel for the image's color space.
fn color_channels(doc: &Document, dict: &Dictionary) -> Option<usize> {
    let cs = match dict.get(b"ColorSpace") {
        Ok(obj) => resolve_object(doc, obj),
        Err(_) => return Some(3),
    };
    match cs {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"G" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(arr) => match arr.first() {
            Some(Object::Name(n)) if n == b"ICCBased" => {
                let n = arr
                    .get(1)
                    .and_then(|s| resolve_object(doc, s).as_stream().ok())
                    .and_then(|s| dict_int(doc, &s.dict, b"N"))
                    .unwrap_or(3);
                matches!(n, 1 | 3 | 4).then_some(n as usize)
            }
            Some(Object::Name(n)) if n == b"CalRGB" => Some(3),
            Some(Object::Name(n)) if n == b"CalGray" => Some(1),
            _ => None,
        },
        _ => None,
    }
}

/// Reverse PNG row filters (predictors 10–15): each row is prefixed by a
/// filter-type byte.
///
/// `bpp` is bytes per pixel; at 8 bits per component the left neighbor is
/// one pixel back.
fn undo_png_predictor(data: &[u8], row_len: usize, bpp: usize) -> Option<Vec<u8>> {
    if row_len == 0 || bpp == 0 {
        return None;
    }
    let stride = row_len + 1;
    let rows = data.len() / stride;
    let mut out = vec![0u8; rows * row_len];
    let mut prev = vec![0u8; row_len];

    for r in 0..rows {
        let src = &data[r * stride..(r + 1) * stride];
        let (kind, line) = (src[0], &src[1..]);
        let row = &mut out[r * row_len..(r + 1) * row_len];
        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match kind {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return None,
            };
            row[i] = line[i].wrapping_add(predicted);
        }
        prev.copy_from_slice(row);
    }
    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Quality, encode_jpeg};
    use crate::test_helpers::solid_rgb;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use lopdf::dictionary;
    use std::io::Write;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn raw_image(width: i64, height: i64, color_space: &str, pixels: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => Object::Name(b"XObject".to_vec()),
                "Subtype" => Object::Name(b"Image".to_vec()),
                "Width" => Object::Integer(width),
                "Height" => Object::Integer(height),
                "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
                "BitsPerComponent" => Object::Integer(8),
            },
            pixels,
        )
    }

    /// One-page PDF. `xobjects` builds the page's XObject resource
    /// dictionary; `media_box_on_tree` moves the MediaBox to the Pages node.
    fn build_pdf(
        media_box: [i64; 4],
        media_box_on_tree: bool,
        content: &[u8],
        xobjects: impl FnOnce(&mut Document) -> Dictionary,
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let xobject_dict = xobjects(&mut doc);
        let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content.to_vec())));
        let media: Vec<Object> = media_box.iter().map(|&v| Object::Integer(v)).collect();

        let mut page = dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! { "XObject" => xobject_dict },
        };
        let mut pages = dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Count" => Object::Integer(1),
        };
        if media_box_on_tree {
            pages.set("MediaBox", media);
        } else {
            page.set("MediaBox", media);
        }
        let page_id = doc.add_object(page);
        pages.set("Kids", vec![Object::Reference(page_id)]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn render(pdf: &[u8]) -> RgbImage {
        XObjectRasterizer.first_page(pdf).unwrap().to_rgb8()
    }

    fn single_image(doc: &mut Document, stream: Stream) -> Dictionary {
        let id = doc.add_object(Object::Stream(stream));
        dictionary! { "Im" => Object::Reference(id) }
    }

    // =========================================================================
    // Page geometry
    // =========================================================================

    #[test]
    fn empty_page_is_white_media_box() {
        let pdf = build_pdf([0, 0, 100, 50], false, b"", |_| Dictionary::new());
        let page = render(&pdf);
        assert_eq!(page.dimensions(), (100, 50));
        assert!(page.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let pdf = build_pdf([0, 0, 30, 40], true, b"", |_| Dictionary::new());
        assert_eq!(render(&pdf).dimensions(), (30, 40));
    }

    #[test]
    fn offset_media_box_is_translated() {
        let content = b"q 100 0 0 50 10 20 cm /Im Do Q";
        let pdf = build_pdf([10, 20, 110, 70], false, content, |doc| {
            single_image(doc, raw_image(1, 1, "DeviceRGB", vec![0, 200, 0]))
        });
        let page = render(&pdf);
        assert_eq!(page.dimensions(), (100, 50));
        assert!(page.pixels().all(|p| *p == Rgb([0, 200, 0])));
    }

    #[test]
    fn image_lands_where_ctm_places_it() {
        // 2x2 image in the bottom-left quadrant; image row 0 is its top row.
        let pixels = vec![
            255, 0, 0, /**/ 0, 255, 0, //
            0, 0, 255, /**/ 0, 0, 0,
        ];
        let content = b"q 50 0 0 25 0 0 cm /Im Do Q";
        let pdf = build_pdf([0, 0, 100, 50], false, content, |doc| {
            single_image(doc, raw_image(2, 2, "DeviceRGB", pixels))
        });
        let page = render(&pdf);
        assert_eq!(page.get_pixel(10, 30), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(40, 30), &Rgb([0, 255, 0]));
        assert_eq!(page.get_pixel(10, 45), &Rgb([0, 0, 255]));
        assert_eq!(page.get_pixel(40, 45), &Rgb([0, 0, 0]));
        assert_eq!(page.get_pixel(75, 10), &WHITE);
        assert_eq!(page.get_pixel(10, 10), &WHITE);
    }

    #[test]
    fn restore_drops_inner_transform() {
        // The second Do runs with the outer CTM, which maps the image to 1x1pt.
        let content = b"q 100 0 0 50 0 0 cm Q /Im Do";
        let pdf = build_pdf([0, 0, 100, 50], false, content, |doc| {
            single_image(doc, raw_image(1, 1, "DeviceRGB", vec![0, 0, 0]))
        });
        let page = render(&pdf);
        assert_eq!(page.get_pixel(0, 49), &Rgb([0, 0, 0]));
        assert_eq!(page.get_pixel(50, 25), &WHITE);
    }

    // =========================================================================
    // Image decoding
    // =========================================================================

    #[test]
    fn gray_and_cmyk_images_convert_to_rgb() {
        let content = b"q 50 0 0 50 0 0 cm /G Do Q q 50 0 0 50 50 0 cm /K Do Q";
        let pdf = build_pdf([0, 0, 100, 50], false, content, |doc| {
            let gray = doc.add_object(Object::Stream(raw_image(1, 1, "DeviceGray", vec![100])));
            let cmyk = doc.add_object(Object::Stream(raw_image(
                1,
                1,
                "DeviceCMYK",
                vec![0, 255, 255, 0],
            )));
            dictionary! {
                "G" => Object::Reference(gray),
                "K" => Object::Reference(cmyk),
            }
        });
        let page = render(&pdf);
        assert_eq!(page.get_pixel(25, 25), &Rgb([100, 100, 100]));
        assert_eq!(page.get_pixel(75, 25), &Rgb([255, 0, 0]));
    }

    #[test]
    fn dct_image_is_decoded() {
        let jpeg = encode_jpeg(&solid_rgb(16, 16, [90, 90, 90]), Quality::new(95)).unwrap();
        let mut stream = raw_image(16, 16, "DeviceRGB", jpeg);
        stream.dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        let content = b"q 16 0 0 16 0 0 cm /Im Do Q";
        let pdf = build_pdf([0, 0, 16, 16], false, content, |doc| single_image(doc, stream));
        let page = render(&pdf);
        let p = page.get_pixel(8, 8);
        assert!(p.0.iter().all(|&c| (85..=95).contains(&c)), "got {p:?}");
    }

    #[test]
    fn png_predicted_flate_image_is_decoded() {
        // Two rows of two RGB pixels, both rows with the Sub filter (type 1).
        let rows = vec![
            1, 10, 20, 30, 5, 5, 5, // (10,20,30) (15,25,35)
            1, 100, 0, 0, 1, 1, 1, // (100,0,0) (101,1,1)
        ];
        let mut stream = raw_image(2, 2, "DeviceRGB", deflate(&rows));
        stream.dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        stream.dict.set(
            "DecodeParms",
            dictionary! {
                "Predictor" => Object::Integer(15),
                "Colors" => Object::Integer(3),
                "Columns" => Object::Integer(2),
            },
        );
        let content = b"q 2 0 0 2 0 0 cm /Im Do Q";
        let pdf = build_pdf([0, 0, 2, 2], false, content, |doc| single_image(doc, stream));
        let page = render(&pdf);
        assert_eq!(page.get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(page.get_pixel(1, 0), &Rgb([15, 25, 35]));
        assert_eq!(page.get_pixel(0, 1), &Rgb([100, 0, 0]));
        assert_eq!(page.get_pixel(1, 1), &Rgb([101, 1, 1]));
    }

    #[test]
    fn truncated_image_data_is_skipped() {
        let content = b"q 10 0 0 10 0 0 cm /Im Do Q";
        let pdf = build_pdf([0, 0, 10, 10], false, content, |doc| {
            single_image(doc, raw_image(4, 4, "DeviceRGB", vec![0; 5]))
        });
        assert!(render(&pdf).pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn nested_form_xobject_is_followed() {
        let content = b"/Fm Do";
        let pdf = build_pdf([0, 0, 20, 10], false, content, |doc| {
            let image = doc.add_object(Object::Stream(raw_image(
                1,
                1,
                "DeviceRGB",
                vec![7, 8, 9],
            )));
            let form = Stream::new(
                dictionary! {
                    "Type" => Object::Name(b"XObject".to_vec()),
                    "Subtype" => Object::Name(b"Form".to_vec()),
                    "BBox" => vec![
                        Object::Integer(0), Object::Integer(0),
                        Object::Integer(10), Object::Integer(10),
                    ],
                    "Matrix" => vec![
                        Object::Integer(2), Object::Integer(0),
                        Object::Integer(0), Object::Integer(1),
                        Object::Integer(0), Object::Integer(0),
                    ],
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "Inner" => Object::Reference(image) },
                    },
                },
                b"q 10 0 0 10 0 0 cm /Inner Do Q".to_vec(),
            );
            let form_id = doc.add_object(Object::Stream(form));
            dictionary! { "Fm" => Object::Reference(form_id) }
        });
        let page = render(&pdf);
        // Form matrix doubles the width: the 10x10 image covers the 20x10 page.
        assert!(page.pixels().all(|p| *p == Rgb([7, 8, 9])));
    }

    // =========================================================================
    // Text and vector content
    // =========================================================================

    #[test]
    fn text_only_page_is_unsupported() {
        let content = b"BT /F1 48 Tf 72 700 Td (HELLO PASSPORT) Tj ET 0 0 1 rg 72 72 200 100 re f";
        let pdf = build_pdf([0, 0, 612, 792], false, content, |_| Dictionary::new());
        let err = XObjectRasterizer.first_page(&pdf).unwrap_err();
        assert!(matches!(err, PhotoError::UnsupportedDocument(_)), "{err:?}");
    }

    #[test]
    fn stroked_path_alone_is_unsupported() {
        let pdf = build_pdf([0, 0, 50, 50], false, b"0 0 m 50 50 l S", |_| Dictionary::new());
        assert!(XObjectRasterizer.first_page(&pdf).is_err());
    }

    #[test]
    fn image_with_caption_still_renders() {
        let content = b"q 10 0 0 10 0 0 cm /Im Do Q BT /F1 8 Tf 0 12 Td (caption) Tj ET";
        let pdf = build_pdf([0, 0, 10, 20], false, content, |doc| {
            single_image(doc, raw_image(1, 1, "DeviceRGB", vec![40, 50, 60]))
        });
        let page = render(&pdf);
        assert_eq!(page.get_pixel(5, 15), &Rgb([40, 50, 60]));
    }

    #[test]
    fn clipping_path_without_paint_is_not_text() {
        let content = b"q 0 0 10 10 re W n 10 0 0 10 0 0 cm /Im Do Q";
        let pdf = build_pdf([0, 0, 10, 10], false, content, |doc| {
            single_image(doc, raw_image(1, 1, "DeviceRGB", vec![1, 2, 3]))
        });
        assert!(render(&pdf).pixels().all(|p| *p == Rgb([1, 2, 3])));
    }

    // =========================================================================
    // Documents without a usable page
    // =========================================================================

    #[test]
    fn zero_page_document_is_unsupported() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => Vec::<Object>::new(),
            "Count" => Object::Integer(0),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();

        let err = XObjectRasterizer.first_page(&buf).unwrap_err();
        assert!(matches!(err, PhotoError::UnsupportedDocument(_)));
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn render_dimensions_at_native_resolution() {
        assert_eq!(render_dimensions(612.0, 792.0, 72).unwrap(), (612, 792));
        assert_eq!(render_dimensions(612.0, 792.0, 144).unwrap(), (1224, 1584));
        assert_eq!(render_dimensions(0.2, 0.2, 72).unwrap(), (1, 1));
    }

    #[test]
    fn render_dimensions_keep_long_edges() {
        assert_eq!(render_dimensions(12_000.0, 4.0, 72).unwrap(), (12_000, 4));
        assert_eq!(render_dimensions(1.0, 250_000.0, 72).unwrap(), (1, 250_000));
    }

    #[test]
    fn render_dimensions_reject_oversized_pages() {
        let err = render_dimensions(100_000.0, 50_000.0, 72).unwrap_err();
        assert!(matches!(err, PhotoError::UnsupportedDocument(_)));
        assert!(render_dimensions(10_000.0, 10_000.0, 72).is_ok());
        assert!(render_dimensions(10_000.0, 10_001.0, 72).is_err());
    }

    #[test]
    fn matrix_concatenation_applies_inner_first() {
        let scale = Matrix { a: 2.0, d: 3.0, ..Matrix::IDENTITY };
        let shift = Matrix { e: 10.0, f: 20.0, ..Matrix::IDENTITY };
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 23.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 63.0));
    }

    #[test]
    fn matrix_inverse_round_trips() {
        let m = Matrix { a: 2.0, b: 0.5, c: -1.0, d: 3.0, e: 4.0, f: 5.0 };
        let (x, y) = m.apply(0.25, 0.75);
        let (u, v) = m.apply_inverse(x, y).unwrap();
        assert!((u - 0.25).abs() < 1e-5 && (v - 0.75).abs() < 1e-5);

        let flat = Matrix { a: 1.0, b: 1.0, c: 1.0, d: 1.0, e: 0.0, f: 0.0 };
        assert!(flat.apply_inverse(1.0, 1.0).is_none());
    }
}
