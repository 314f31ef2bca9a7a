//! Parameter types for the pipeline stages.
//!
//! These structs describe *what* to produce, not *how*. They are the
//! interface between the [`tools`](crate::tools) layer (which decides what a
//! request needs) and the stage functions (which do the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–100, default 95). Clamped on construction.
//! - [`TargetSize`]: Fixed output pixel box; [`TargetSize::PASSPORT`] is 413×531.
//! - [`BoundingBox`]: Crop rectangle in source pixels, always non-empty.
//! - [`BackgroundColor`]: Named or hex fill color for the compositor.
//! - [`BackgroundStyle`]: What goes behind the subject.

use image::Rgb;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    /// Lowest quality the size search will ever try.
    pub const FLOOR: Quality = Quality(5);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    /// First quality tried by the size search.
    fn default() -> Self {
        Self(95)
    }
}

/// Output pixel box for the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    /// 35×45 mm at 300 DPI.
    pub const PASSPORT: TargetSize = TargetSize {
        width: 413,
        height: 531,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Crop rectangle `(x1, y1)..(x2, y2)` in source pixel coordinates.
///
/// Invariant: `x1 < x2` and `y1 < y2`. Constructors clamp to the source
/// bounds they are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// The whole bitmap.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: width.max(1),
            y2: height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Fill color for [`BackgroundStyle::SolidColor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundColor(pub Rgb<u8>);

impl BackgroundColor {
    pub const WHITE: BackgroundColor = BackgroundColor(Rgb([255, 255, 255]));
    pub const BLUE: BackgroundColor = BackgroundColor(Rgb([0, 0, 255]));
    pub const RED: BackgroundColor = BackgroundColor(Rgb([255, 0, 0]));
    pub const GREY: BackgroundColor = BackgroundColor(Rgb([128, 128, 128]));

    /// Resolve a color name (`blue`, `white`, `red`, `grey`/`gray`,
    /// case-insensitive) or a `#rrggbb` literal. Anything else is white.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if let Some(hex) = name.strip_prefix('#') {
            return Self::from_hex(hex).unwrap_or(Self::WHITE);
        }
        match name.to_ascii_lowercase().as_str() {
            "blue" => Self::BLUE,
            "red" => Self::RED,
            "grey" | "gray" => Self::GREY,
            _ => Self::WHITE,
        }
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self(Rgb([channel(0)?, channel(2)?, channel(4)?])))
    }

    pub fn rgb(self) -> Rgb<u8> {
        self.0
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::WHITE
    }
}

/// What the compositor places behind the subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundStyle {
    SolidColor(BackgroundColor),
    /// Gaussian blur of the original; `radius` is used as sigma.
    BlurredOriginal { radius: f32 },
    Transparent,
}

impl BackgroundStyle {
    pub const DEFAULT_BLUR_RADIUS: f32 = 10.0;

    pub fn blurred() -> Self {
        Self::BlurredOriginal {
            radius: Self::DEFAULT_BLUR_RADIUS,
        }
    }
}
