//! QR code rendering.

use crate::error::PhotoError;
use image::{GrayImage, Luma};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};

/// Pixels per module.
pub const BOX_SIZE: u32 = 10;
/// Quiet zone width, in modules.
pub const BORDER: u32 = 5;

/// Render `text` as a QR code: error correction M, 10 px modules and a
/// 5-module white border, smallest version (1–40) that fits.
///
/// Fails with [`PhotoError::PayloadTooLarge`] past version-40 capacity.
pub fn encode_qr(text: &str) -> Result<GrayImage, PhotoError> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::M).map_err(|e| {
        match e {
            QrError::DataTooLong => PhotoError::PayloadTooLarge { len: text.len() },
            other => PhotoError::Encode(format!("QR: {other}")),
        }
    })?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * BORDER) * BOX_SIZE;

    Ok(GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / BOX_SIZE, y / BOX_SIZE);
        let inside = (BORDER..BORDER + modules).contains(&mx) && (BORDER..BORDER + modules).contains(&my);
        let dark = inside
            && colors[((my - BORDER) * modules + (mx - BORDER)) as usize] == Color::Dark;
        Luma([if dark { 0 } else { 255 }])
    }))
}
