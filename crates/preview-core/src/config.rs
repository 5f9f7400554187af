//! Preview configuration
//!
//! Every section is optional in the TOML file; missing fields take the
//! defaults below. Call [`PreviewConfig::validate`] (done by
//! [`PreviewConfig::from_toml_str`] and by every cache constructor) to reject
//! invalid values before anything is built.
//!
//! ```toml
//! [image_cache]
//! ttl_secs = 60.0
//! sweep_interval_secs = 15.0
//! max_item_bytes = 100663296
//! cost_model = "four_bytes_per_pixel"
//!
//! [markdown_cache]
//! max_html_entries = 200
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::{ScaleLimits, SizingPolicy};

const MIB: u64 = 1024 * 1024;

/// Root configuration for all preview caches and policies
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub image_cache: ImageCacheConfig,
    pub markdown_cache: MarkdownCacheConfig,
    pub scale: ScaleConfig,
    pub sizing: SizingConfig,
}

impl PreviewConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.image_cache.validate()?;
        self.markdown_cache.validate()?;
        self.scale.validate()?;
        self.sizing.validate()
    }
}

/// How the image cache estimates the memory cost of a decoded bitmap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCostModel {
    /// width × height × 4, regardless of the actual pixel format
    #[default]
    FourBytesPerPixel,
    /// Length of the decoded backing buffer
    BackingBuffer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageCacheConfig {
    /// Sliding time-to-live, refreshed on every hit
    pub ttl_secs: f64,
    /// Interval of the background expiry sweep
    pub sweep_interval_secs: f64,
    /// Bitmaps costing more than this are never cached
    pub max_item_bytes: u64,
    /// Aggregate cost ceiling across all entries
    pub max_total_bytes: u64,
    pub max_items: usize,
    pub cost_model: ImageCostModel,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60.0,
            sweep_interval_secs: 15.0,
            max_item_bytes: 96 * MIB,
            max_total_bytes: 160 * MIB,
            max_items: 40,
            cost_model: ImageCostModel::FourBytesPerPixel,
        }
    }
}

impl ImageCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs_f64(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_secs("image_cache.ttl_secs", self.ttl_secs)?;
        positive_secs("image_cache.sweep_interval_secs", self.sweep_interval_secs)?;
        nonzero("image_cache.max_items", self.max_items as u64)?;
        nonzero("image_cache.max_item_bytes", self.max_item_bytes)?;
        nonzero("image_cache.max_total_bytes", self.max_total_bytes)?;
        if self.max_item_bytes > self.max_total_bytes {
            return Err(ConfigError::ItemExceedsTotal {
                per_item: self.max_item_bytes,
                total: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkdownCacheConfig {
    /// Aggregate HTML ceiling, counted as 2 bytes per UTF-16 code unit
    pub max_html_bytes: u64,
    pub max_html_entries: usize,
    pub max_metrics_entries: usize,
}

impl Default for MarkdownCacheConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: 8 * MIB,
            max_html_entries: 200,
            max_metrics_entries: 400,
        }
    }
}

impl MarkdownCacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero("markdown_cache.max_html_bytes", self.max_html_bytes)?;
        nonzero("markdown_cache.max_html_entries", self.max_html_entries as u64)?;
        nonzero(
            "markdown_cache.max_metrics_entries",
            self.max_metrics_entries as u64,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub max_side_pixels: u32,
    pub max_total_pixels: u64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        let limits = ScaleLimits::default();
        Self {
            max_side_pixels: limits.max_side_pixels,
            max_total_pixels: limits.max_total_pixels,
        }
    }
}

impl ScaleConfig {
    pub fn limits(&self) -> ScaleLimits {
        ScaleLimits {
            max_side_pixels: self.max_side_pixels,
            max_total_pixels: self.max_total_pixels,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero("scale.max_side_pixels", self.max_side_pixels as u64)?;
        nonzero("scale.max_total_pixels", self.max_total_pixels)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Payloads at or above this many UTF-16 units skip measurement
    pub measure_limit_utf16: usize,
    /// More lines than this skip width measurement
    pub max_measured_lines: usize,
    /// Desired widths at or above this fraction of the maximum snap to it
    pub snap_ratio: f64,
    /// Extra width added on top of the padded line width
    pub slack: f64,
    pub tab_width: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        let policy = SizingPolicy::default();
        Self {
            measure_limit_utf16: policy.measure_limit_utf16,
            max_measured_lines: policy.max_measured_lines,
            snap_ratio: policy.snap_ratio,
            slack: policy.slack,
            tab_width: policy.tab_width,
        }
    }
}

impl SizingConfig {
    pub fn policy(&self) -> SizingPolicy {
        SizingPolicy {
            measure_limit_utf16: self.measure_limit_utf16,
            max_measured_lines: self.max_measured_lines,
            snap_ratio: self.snap_ratio,
            slack: self.slack,
            tab_width: self.tab_width,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero("sizing.measure_limit_utf16", self.measure_limit_utf16 as u64)?;
        nonzero("sizing.max_measured_lines", self.max_measured_lines as u64)?;
        if self.snap_ratio.is_nan() || self.snap_ratio <= 0.0 || self.snap_ratio > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "sizing.snap_ratio",
                value: self.snap_ratio,
                min: 0.0,
                max: 1.0,
            });
        }
        if !(self.slack.is_finite() && self.slack >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "sizing.slack",
                value: self.slack,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(())
    }
}

fn positive_secs(field: &'static str, value: f64) -> Result<(), ConfigError> {
    // Duration::from_secs_f64 panics on overflow, so cap at a century
    if value.is_finite() && value > 0.0 && value < 3.2e9 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration { field, value })
    }
}

fn nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroLimit { field })
    } else {
        Ok(())
    }
}
