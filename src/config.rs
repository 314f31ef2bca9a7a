//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `passport-photo.toml`. Stock
//! defaults are the base layer; a user file overrides just the keys it names.
//!
//! ## Config File Location
//!
//! The CLI reads the file given by `--config`, otherwise
//! `passport-photo.toml` in the current directory. A missing file means
//! stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [passport]
//! width = 413               # Print size in pixels (35x45 mm at 300 DPI)
//! height = 531
//! budget_kb = 140           # Upload ceiling for the compressed passport JPEG
//! hd_quality = 100          # JPEG quality for --hd
//!
//! [compress]
//! quality_step = 5          # Quality decrement per search step
//! max_dimension = 2000      # Longer side is downscaled to this before searching
//!
//! [background]
//! default_color = "white"   # Passport backdrop: white, blue, red, grey or #rrggbb
//! blur_radius = 10.0        # Gaussian sigma for the blur tool
//!
//! [output]
//! jpeg_quality = 75         # convert / background / pdf-to-image
//! blur_quality = 95
//!
//! [models]
//! segmentation = "models/u2netp.onnx"                 # needs the `onnx` feature
//! face_detector = "models/seeta_fd_frontal_v1.0.bin"  # needs the `rustface` feature
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const CONFIG_FILENAME: &str = "passport-photo.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `passport-photo.toml`.
///
/// All fields have defaults. User files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Passport print size, upload budget and HD quality.
    pub passport: PassportConfig,
    /// Size-constrained encoder search parameters.
    pub compress: CompressConfig,
    /// Backdrop color and blur strength.
    pub background: BackgroundConfig,
    /// Single-pass JPEG qualities for the auxiliary tools.
    pub output: OutputConfig,
    /// Optional model files for the heavy backends.
    pub models: ModelsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.passport.width == 0 || self.passport.height == 0 {
            return Err(ConfigError::Validation(
                "passport.width and passport.height must be non-zero".into(),
            ));
        }
        if !(self.passport.budget_kb > 0.0) {
            return Err(ConfigError::Validation(
                "passport.budget_kb must be positive".into(),
            ));
        }
        for (key, quality) in [
            ("passport.hd_quality", self.passport.hd_quality),
            ("output.jpeg_quality", self.output.jpeg_quality),
            ("output.blur_quality", self.output.blur_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if self.compress.quality_step == 0 {
            return Err(ConfigError::Validation(
                "compress.quality_step must be non-zero".into(),
            ));
        }
        if self.compress.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "compress.max_dimension must be non-zero".into(),
            ));
        }
        if !(self.background.blur_radius >= 0.0) {
            return Err(ConfigError::Validation(
                "background.blur_radius must be zero or positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PassportConfig {
    pub width: u32,
    pub height: u32,
    /// Kilobyte ceiling for the compressed passport JPEG.
    pub budget_kb: f64,
    pub hd_quality: u32,
}

impl Default for PassportConfig {
    fn default() -> Self {
        Self {
            width: 413,
            height: 531,
            budget_kb: 140.0,
            hd_quality: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressConfig {
    pub quality_step: u8,
    pub max_dimension: u32,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            quality_step: 5,
            max_dimension: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    /// Backdrop used by the passport tool. Unknown names fall back to white.
    pub default_color: String,
    pub blur_radius: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            default_color: "white".to_string(),
            blur_radius: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub jpeg_quality: u32,
    pub blur_quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            blur_quality: 95,
        }
    }
}

/// Model file locations. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    /// U²-Net ONNX model. Ignored without the `onnx` feature.
    pub segmentation: Option<PathBuf>,
    /// SeetaFace model. Ignored without the `rustface` feature.
    pub face_detector: Option<PathBuf>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `passport-photo.toml` from the given directory, or stock defaults
/// when the directory has none.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_config(&dir.join(CONFIG_FILENAME))?;
    resolve_config(stock_defaults_value()?, overlay)
}

/// Load an explicitly named config file. Unlike [`load_config`], a missing
/// file is an error.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Returns a fully-commented stock `passport-photo.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# passport-photo Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# The CLI reads the file passed with --config, otherwise passport-photo.toml
# in the current directory. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Passport photo
# ---------------------------------------------------------------------------
[passport]
# Output size in pixels. 413x531 is 35x45 mm at 300 DPI.
width = 413
height = 531

# Upload ceiling in kilobytes for the compressed passport JPEG.
budget_kb = 140.0

# JPEG quality for the uncompressed (--hd) variant.
hd_quality = 100

# ---------------------------------------------------------------------------
# Size-constrained compression
# ---------------------------------------------------------------------------
[compress]
# Quality decrement per search step, starting from 95.
quality_step = 5

# Images with a side longer than this are downscaled once before searching.
max_dimension = 2000

# ---------------------------------------------------------------------------
# Backgrounds
# ---------------------------------------------------------------------------
[background]
# Backdrop for passport photos: white, blue, red, grey, or "#rrggbb".
# Unknown names fall back to white.
default_color = "white"

# Gaussian blur sigma for the portrait blur tool.
blur_radius = 10.0

# ---------------------------------------------------------------------------
# Single-pass JPEG output
# ---------------------------------------------------------------------------
[output]
# Used by convert, background and pdf-to-image.
jpeg_quality = 75

# Used by the portrait blur tool.
blur_quality = 95

# ---------------------------------------------------------------------------
# Model files
# ---------------------------------------------------------------------------
[models]
# U2-Net ONNX model for background removal (requires the `onnx` feature).
# Without it, a built-in color-key segmenter is used.
# segmentation = "models/u2netp.onnx"

# SeetaFace frontal face model (requires the `rustface` feature).
# Without it, passport crops fall back to the full frame.
# face_detector = "models/seeta_fd_frontal_v1.0.bin"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit for auto (= number of CPU cores).
# Values above the core count are clamped down.
# max_processes = 4
"##
}
