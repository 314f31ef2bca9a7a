use super::MAX_PAGE_PIXELS;
use crate::error::PhotoError;
use crate::imaging::ensure_valid;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::io::Write;

/// XObject name the page content draws.
const IMAGE_NAME: &[u8] = b"Im0";

/// Wrap a bitmap as a single-page PDF.
///
/// The page measures one point per pixel and the image fills it as a
/// lossless FlateDecode DeviceRGB stream. Alpha is dropped. Bitmaps above
/// [`MAX_PAGE_PIXELS`] are refused.
pub fn wrap_as_document(bitmap: &DynamicImage) -> Result<Vec<u8>, PhotoError> {
    ensure_valid(bitmap)?;
    ensure_page_size(bitmap.width(), bitmap.height())?;
    let rgb = bitmap.to_rgb8();
    let (width, height) = (rgb.width() as i64, rgb.height() as i64);

    let flate_error = |e: std::io::Error| PhotoError::Encode(format!("FlateDecode: {e}"));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw()).map_err(flate_error)?;
    let compressed = encoder.finish().map_err(flate_error)?;

    build_document(compressed, width, height)
}

fn ensure_page_size(width: u32, height: u32) -> Result<(), PhotoError> {
    if width as u64 * height as u64 > MAX_PAGE_PIXELS {
        return Err(PhotoError::InvalidImage(format!(
            "{width}x{height} bitmap is above the {MAX_PAGE_PIXELS} pixel page limit"
        )));
    }
    Ok(())
}

fn build_document(pixels: Vec<u8>, width: i64, height: i64) -> Result<Vec<u8>, PhotoError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    // Already deflated: keep lopdf from compressing it a second time.
    let mut image = Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(width),
            "Height" => Object::Integer(height),
            "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => Object::Name(b"FlateDecode".to_vec()),
        },
        pixels,
    );
    image.allows_compression = false;
    let image_id = doc.add_object(Object::Stream(image));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| PhotoError::Encode(format!("content stream: {e}")))?;
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content_bytes)));

    let page_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Page".to_vec()),
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => Object::Reference(image_id),
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| PhotoError::Encode(format!("PDF: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::solid_rgb;

    #[test]
    fn page_size_limit_matches_extraction() {
        assert!(ensure_page_size(12_000, 4).is_ok());
        assert!(ensure_page_size(10_000, 10_000).is_ok());
        assert!(matches!(
            ensure_page_size(10_000, 10_001),
            Err(PhotoError::InvalidImage(_))
        ));
    }

    #[test]
    fn output_starts_with_pdf_header() {
        let pdf = wrap_as_document(&solid_rgb(10, 10, [0, 0, 0])).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn single_page_with_pixel_sized_media_box() {
        let pdf = wrap_as_document(&solid_rgb(413, 531, [255, 255, 255])).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let dims: Vec<i64> = media_box.iter().map(|o| o.as_i64().unwrap()).collect();
        assert_eq!(dims, vec![0, 0, 413, 531]);
    }

    #[test]
    fn image_stream_is_flate_rgb() {
        let pdf = wrap_as_document(&solid_rgb(4, 3, [1, 2, 3])).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let image = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(b"Image".as_slice()))
            .unwrap();
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert_eq!(image.dict.get(b"Height").unwrap().as_i64().unwrap(), 3);
        assert_eq!(
            image.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"FlateDecode".as_slice()
        );
    }

    #[test]
    fn rgba_input_is_flattened() {
        let pdf = wrap_as_document(&DynamicImage::new_rgba8(5, 5)).unwrap();
        assert!(Document::load_mem(&pdf).is_ok());
    }

    #[test]
    fn zero_size_bitmap_is_invalid() {
        assert!(matches!(
            wrap_as_document(&DynamicImage::new_rgb8(0, 0)),
            Err(PhotoError::InvalidImage(_))
        ));
    }
}
