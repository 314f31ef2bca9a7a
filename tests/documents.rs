//! PDF and QR conversions through the public API.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use passport_photo::document::{extract_first_page, render_dimensions, wrap_as_document};
use passport_photo::error::PhotoError;
use passport_photo::imaging::{Quality, decode_bitmap, encode_jpeg};
use passport_photo::qr::encode_qr;
use passport_photo::tools::{Engine, Tool, ToolInput, ToolRequest};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 90])
    }))
}

fn decode_qr(image: &image::GrayImage) -> String {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        image.width() as usize,
        image.height() as usize,
        |x, y| image.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1);
    grids[0].decode().unwrap().1
}

/// A Letter page (612×792 pt) with a JPEG drawn into a 200×100 pt box at
/// (50, 600), the way scanners and office suites emit photos.
fn letter_page_with_jpeg(jpeg: Vec<u8>, px_width: i64, px_height: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image = Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(px_width),
            "Height" => Object::Integer(px_height),
            "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => Object::Name(b"DCTDecode".to_vec()),
        },
        jpeg,
    );
    let image_id = doc.add_object(Object::Stream(image));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(200),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(100),
                    Object::Integer(50),
                    Object::Integer(600),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Photo".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {},
        content.encode().unwrap(),
    )));

    let page_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Page".to_vec()),
        "Parent" => Object::Reference(pages_id),
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Photo" => Object::Reference(image_id) },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// A Letter page carrying a line of text and a filled rectangle, no images.
fn text_only_page() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = b"BT /F1 48 Tf 72 700 Td (HELLO PASSPORT) Tj ET 0 0 1 rg 72 72 200 100 re f";
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content.to_vec())));
    let page_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Page".to_vec()),
        "Parent" => Object::Reference(pages_id),
        "Contents" => Object::Reference(content_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
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
    doc.save_to(&mut buf).unwrap();
    buf
}

// =========================================================================
// Wrap and extract
// =========================================================================

#[test]
fn wrap_then_extract_keeps_passport_pixels() {
    let bitmap = gradient(413, 531);
    let pdf = wrap_as_document(&bitmap).unwrap();
    let page = extract_first_page(&pdf).unwrap();

    assert_eq!(page.dimensions(), (413, 531));
    assert_eq!(page.to_rgb8(), bitmap.to_rgb8());
}

#[test]
fn extract_paints_dct_image_on_letter_page() {
    let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([200, 30, 30])));
    let jpeg = encode_jpeg(&red, Quality::new(95)).unwrap();
    let pdf = letter_page_with_jpeg(jpeg, 40, 20);

    let page = extract_first_page(&pdf).unwrap().to_rgb8();
    assert_eq!(page.dimensions(), (612, 792));

    // Image box spans x 50..250, y (from the top) 792-700..792-600 = 92..192
    let inside = page.get_pixel(150, 142);
    assert!(inside[0] > 170 && inside[1] < 70, "{inside:?}");
    assert_eq!(*page.get_pixel(10, 10), Rgb([255, 255, 255]));
    assert_eq!(*page.get_pixel(300, 142), Rgb([255, 255, 255]));
}

#[test]
fn wide_bitmap_round_trips_at_full_size() {
    let bitmap = gradient(12_000, 4);
    let pdf = wrap_as_document(&bitmap).unwrap();
    let page = extract_first_page(&pdf).unwrap();
    assert_eq!(page.dimensions(), (12_000, 4));
    assert_eq!(page.to_rgb8(), bitmap.to_rgb8());
}

#[test]
fn text_only_page_is_refused_not_blank() {
    let result = extract_first_page(&text_only_page());
    assert!(matches!(result, Err(PhotoError::UnsupportedDocument(_))));
}

#[test]
fn extract_rejects_non_pdf_bytes() {
    let png = {
        let mut buf = Vec::new();
        gradient(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    };
    assert!(matches!(
        extract_first_page(&png),
        Err(PhotoError::UnsupportedDocument(_))
    ));
}

#[test]
fn render_dimensions_at_native_resolution() {
    assert_eq!(render_dimensions(612.0, 792.0, 72).unwrap(), (612, 792));
    assert_eq!(render_dimensions(595.3, 841.9, 72).unwrap(), (595, 842));
}

// =========================================================================
// Tools
// =========================================================================

#[test]
fn pdf_tools_round_trip_through_engine() {
    let engine = Engine::builder().build();

    let pdf = engine
        .run(ToolRequest::new(ToolInput::Bitmap(gradient(120, 80)), Tool::PdfCreate))
        .unwrap();
    assert_eq!(pdf.file_name, "doc.pdf");
    assert_eq!(pdf.content_type, "application/pdf");
    assert!(pdf.bytes.starts_with(b"%PDF-"));

    let page = engine
        .run(ToolRequest::new(ToolInput::Document(pdf.bytes), Tool::PdfToImage))
        .unwrap();
    assert_eq!(page.file_name, "page_1.jpg");
    let decoded = decode_bitmap(&page.bytes).unwrap();
    assert_eq!(decoded.dimensions(), (120, 80));
}

#[test]
fn pdf_to_image_reports_text_only_page() {
    let engine = Engine::builder().build();
    let result = engine.run(ToolRequest::new(
        ToolInput::Document(text_only_page()),
        Tool::PdfToImage,
    ));
    assert!(matches!(result, Err(PhotoError::UnsupportedDocument(_))));
}

#[test]
fn qr_hello_world_decodes() {
    let code = encode_qr("Hello World").unwrap();
    assert_eq!(decode_qr(&code), "Hello World");
}

#[test]
fn qr_tool_emits_decodable_png() {
    let engine = Engine::builder().build();
    let output = engine
        .run(ToolRequest::new(
            ToolInput::Text("https://example.com/passport".to_string()),
            Tool::Qr,
        ))
        .unwrap();

    assert_eq!(output.file_name, "qrcode.png");
    let gray = decode_bitmap(&output.bytes).unwrap().to_luma8();
    assert_eq!(decode_qr(&gray), "https://example.com/passport");
}
