//! Pure calculation functions for crop geometry and the quality search.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{BoundingBox, Quality};

/// Passport aspect ratio, width:height.
pub const PASSPORT_ASPECT: (u32, u32) = (35, 45);

/// Compute the passport crop box around a detected face.
///
/// The crop is 2.5× the face height tall and 35:45 wide, centered on the
/// face center, then clamped to the image. When the top is clamped to 0 the
/// box extends downward to keep its height.
///
/// # Arguments
/// * `face` - Detected face as `(x, y, width, height)`; may poke outside the image
/// * `image` - Source dimensions `(width, height)`
///
/// # Examples
/// ```
/// # use passport_photo::imaging::face_crop_box;
/// // 100px face centered in a 1000x1000 frame
/// let b = face_crop_box((450, 450, 100, 100), (1000, 1000));
/// assert_eq!((b.x1, b.y1, b.x2, b.y2), (403, 375, 597, 625));
/// ```
pub fn face_crop_box(face: (i64, i64, i64, i64), image: (u32, u32)) -> BoundingBox {
    let (fx, fy, fw, fh) = face;
    let (img_w, img_h) = (image.0.max(1) as i64, image.1.max(1) as i64);

    let center_x = (fx + fw.max(0) / 2).clamp(0, img_w - 1);
    let center_y = (fy + fh.max(0) / 2).clamp(0, img_h - 1);

    let crop_h = (fh.max(0) * 5 / 2).max(1);
    let crop_w = (crop_h * PASSPORT_ASPECT.0 as i64 / PASSPORT_ASPECT.1 as i64).max(1);

    let x1 = (center_x - crop_w / 2).max(0);
    let y1 = (center_y - crop_h / 2).max(0);
    let x2 = (x1 + crop_w).min(img_w);
    let mut y2 = (y1 + crop_h).min(img_h);
    if y1 == 0 {
        y2 = crop_h.min(img_h);
    }

    BoundingBox {
        x1: x1 as u32,
        y1: y1 as u32,
        x2: x2 as u32,
        y2: y2 as u32,
    }
}

/// Source region to keep when filling a target box (crop-to-fill at center).
///
/// Returns `(x, y, width, height)` of the largest centered region of the
/// source with the target's aspect ratio. Resizing that region to the target
/// gives the same result as scaling by the larger ratio and cropping the
/// overflow, without resampling pixels that are thrown away.
pub fn centered_fill_crop(source: (u32, u32), target: (u32, u32)) -> (u32, u32, u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = (target.0.max(1), target.1.max(1));

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    let (crop_w, crop_h) = if src_aspect > tgt_aspect {
        // Source is wider: keep full height, trim the sides
        let w = (src_h as f64 * tgt_aspect).round() as u32;
        (w.clamp(1, src_w), src_h)
    } else {
        // Source is taller (or equal): keep full width, trim top and bottom
        let h = (src_w as f64 / tgt_aspect).round() as u32;
        (src_w, h.clamp(1, src_h))
    };

    ((src_w - crop_w) / 2, (src_h - crop_h) / 2, crop_w, crop_h)
}

/// Dimensions after shrinking so the longer side is at most `max_side`.
///
/// Images already within the limit are returned unchanged; nothing is
/// ever enlarged.
pub fn fit_within(dims: (u32, u32), max_side: u32) -> (u32, u32) {
    let (w, h) = dims;
    let max_side = max_side.max(1);
    if w <= max_side && h <= max_side {
        return dims;
    }
    if w >= h {
        let ratio = max_side as f64 / w as f64;
        (max_side, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        let ratio = max_side as f64 / h as f64;
        (((w as f64 * ratio).round() as u32).max(1), max_side)
    }
}

/// Qualities tried by the size search, in order.
///
/// Descends from `start` by `step` while the quality stays above the floor,
/// then ends at [`Quality::FLOOR`] if the descent did not land on it.
pub fn quality_schedule(start: Quality, step: u8) -> Vec<u8> {
    let floor = Quality::FLOOR.value() as i32;
    let step = step.max(1) as i32;

    let mut schedule = Vec::new();
    let mut quality = start.value() as i32;
    while quality > floor {
        schedule.push(quality as u8);
        quality -= step;
    }
    if schedule.last() != Some(&(floor as u8)) {
        schedule.push(floor as u8);
    }
    schedule
}

/// Size in kilobytes (1 KB = 1024 bytes).
pub fn bytes_to_kb(len: usize) -> f64 {
    len as f64 / 1024.0
}
