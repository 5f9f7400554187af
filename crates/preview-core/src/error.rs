//! Construction-time errors
//!
//! Runtime cache and policy operations never fail; the only rejected inputs
//! are invalid configurations, caught before any cache is built.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse preview config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be a positive, finite number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },

    #[error("per-item cost ceiling ({per_item} bytes) exceeds aggregate ceiling ({total} bytes)")]
    ItemExceedsTotal { per_item: u64, total: u64 },

    #[error("{field} must be within {min}..={max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}
