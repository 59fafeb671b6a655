//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the root of the source directory, next to the gallery folders:
//!
//! ```text
//! galleries/
//! ├── config.toml              # Site config (overrides stock defaults)
//! ├── 20240715/
//! │   ├── gallery.yaml
//! │   └── ...
//! └── 20231102/
//!     └── ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site_name = "Photo Gallery"
//! author = ""
//!
//! [images]
//! cover = 1200              # Longest edge of cover derivatives, in pixels
//! full = 2400               # Longest edge of full-size derivatives
//! thumbnail = 400           # Longest edge of thumbnails
//! quality = 85              # JPEG quality (1-100)
//!
//! [exif]
//! fields = ["Make", "Model", "LensModel", "DateTimeOriginal", "FocalLength",
//!           "FNumber", "ISO", "ExposureTime", "ExposureCompensation"]
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. Stock defaults
//! are serialized to a TOML value, the user file is merged on top key by key,
//! and the result is deserialized and validated.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::exif::KNOWN_FIELDS;
use crate::layout::DerivativeKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of the site configuration within the source directory.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site title, shown in the header of every page.
    pub site_name: String,
    /// Footer attribution.
    pub author: String,
    /// Derivative sizes and encoding quality.
    pub images: ImagesConfig,
    /// EXIF whitelist.
    pub exif: ExifConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "Photo Gallery".to_string(),
            author: String::new(),
            images: ImagesConfig::default(),
            exif: ExifConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        for kind in DerivativeKind::ALL {
            if self.images.bound(kind) == 0 {
                return Err(ConfigError::Validation(format!(
                    "images.{} must be non-zero",
                    kind.dir_name()
                )));
            }
        }
        if let Some(unknown) = self
            .exif
            .fields
            .iter()
            .find(|f| !KNOWN_FIELDS.contains(&f.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "exif.fields: unknown field '{}' (known: {})",
                unknown,
                KNOWN_FIELDS.join(", ")
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Derivative generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longest edge of cover images, in pixels.
    pub cover: u32,
    /// Longest edge of full-size images.
    pub full: u32,
    /// Longest edge of thumbnails.
    pub thumbnail: u32,
    /// JPEG quality, 1-100.
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            cover: 1200,
            full: 2400,
            thumbnail: 400,
            quality: 85,
        }
    }
}

impl ImagesConfig {
    pub fn bound(&self, kind: DerivativeKind) -> u32 {
        match kind {
            DerivativeKind::Cover => self.cover,
            DerivativeKind::Full => self.full,
            DerivativeKind::Thumbnail => self.thumbnail,
        }
    }
}

/// Which EXIF fields reach the output JSON.
///
/// Passed into the builder as plain data; there is no global registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ExifConfig {
    pub fields: Vec<String>,
}

impl Default for ExifConfig {
    fn default() -> Self {
        Self {
            fields: [
                "Make",
                "Model",
                "LensModel",
                "DateTimeOriginal",
                "FocalLength",
                "FNumber",
                "ISO",
                "ExposureTime",
                "ExposureCompensation",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
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

/// Stock defaults as a TOML value, the base every user file merges onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
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

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Photo Gal Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the root of the source directory, next to the
# gallery folders. Unknown keys will cause an error.

# Site title, shown in the header of every page.
site_name = "Photo Gallery"

# Footer attribution.
author = ""

# ---------------------------------------------------------------------------
# Derivatives
# ---------------------------------------------------------------------------
# Every source image is rendered three times, each fitted inside a square of
# the given size (longest edge, in pixels). Images are never upscaled.
[images]
cover = 1200
full = 2400
thumbnail = 400

# JPEG encoding quality (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# EXIF
# ---------------------------------------------------------------------------
[exif]
# Fields copied into the image metadata. Available:
#   Make, Model, LensModel, DateTimeOriginal, FocalLength, FNumber, ISO,
#   ExposureTime, ExposureCompensation, MeteringMode, ExposureProgram,
#   Flash, Orientation
fields = [
    "Make",
    "Model",
    "LensModel",
    "DateTimeOriginal",
    "FocalLength",
    "FNumber",
    "ISO",
    "ExposureTime",
    "ExposureCompensation",
]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.site_name, "Photo Gallery");
        assert_eq!(config.images.cover, 1200);
        assert_eq!(config.images.full, 2400);
        assert_eq!(config.images.thumbnail, 400);
        assert_eq!(config.images.quality, 85);
        assert!(config.exif.fields.contains(&"Make".to_string()));
        assert!(!config.exif.fields.contains(&"Orientation".to_string()));
    }

    #[test]
    fn default_config_is_valid() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[images]
quality = 70
"##;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.images.quality, 70);
        // Default values preserved
        assert_eq!(config.images.full, 2400);
        assert_eq!(config.site_name, "Photo Gallery");
    }

    #[test]
    fn bound_per_kind() {
        let images = ImagesConfig::default();
        assert_eq!(images.bound(DerivativeKind::Cover), 1200);
        assert_eq!(images.bound(DerivativeKind::Full), 2400);
        assert_eq!(images.bound(DerivativeKind::Thumbnail), 400);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_zero_quality() {
        let mut config = SiteConfig::default();
        config.images.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_quality_over_100() {
        let mut config = SiteConfig::default();
        config.images.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_bound() {
        let mut config = SiteConfig::default();
        config.images.thumbnail = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("images.thumbnail"));
    }

    #[test]
    fn validate_rejects_unknown_exif_field() {
        let mut config = SiteConfig::default();
        config.exif.fields.push("ShoeSize".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ShoeSize"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = SiteConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r##"
site_name = "Field Notes"

[images]
thumbnail = 300

[exif]
fields = ["Make", "Flash"]
"##,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site_name, "Field Notes");
        assert_eq!(config.images.thumbnail, 300);
        assert_eq!(config.images.full, 2400);
        assert_eq!(config.exif.fields, vec!["Make".to_string(), "Flash".to_string()]);
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[images]\nsizes = [1, 2]\n").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not [toml").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_runs_validation() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[images]\nquality = 0\n").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_overlay_wins_and_base_keys_survive() {
        let base: toml::Value = toml::from_str("a = 1\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn merge_replaces_arrays_wholesale() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[exif]\nfields = [\"ISO\"]\n").unwrap();
        let config = resolve_config(base, Some(overlay)).unwrap();
        assert_eq!(config.exif.fields, vec!["ISO".to_string()]);
    }

    // =========================================================================
    // Stock config / threads
    // =========================================================================

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(1)
            }),
            1
        );
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(cores + 100)
            }),
            cores
        );
    }
}
