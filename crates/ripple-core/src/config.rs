//! Tunables for path selection and quantization.
//!
//! Loads [`ScatterConfig`] from a TOML file with environment variable
//! overrides via `RIPPLE_*` prefixed variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which sort the index sorter uses for per-worker slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    /// Comparison sort for short slices, radix for long ones.
    #[default]
    Auto,
    Comparison,
    Radix,
    /// Rayon's parallel sort inside a single worker.
    Parallel,
}

impl std::fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Comparison => write!(f, "comparison"),
            Self::Radix => write!(f, "radix"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

impl std::str::FromStr for SortStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "comparison" => Ok(Self::Comparison),
            "radix" => Ok(Self::Radix),
            "parallel" => Ok(Self::Parallel),
            other => Err(format!("unknown sort strategy: {other}")),
        }
    }
}

/// Scatter-add tuning loaded from TOML with environment variable overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    /// Duplicate-rate score above which the sorted local-sum path is taken.
    /// Override: `RIPPLE_DUPLICATE_THRESHOLD`
    pub duplicate_threshold: f32,

    /// Quantization scale is `2^quantization_scale_log2`.
    /// Override: `RIPPLE_QUANTIZATION_SCALE_LOG2`
    pub quantization_scale_log2: u32,

    /// Worker slices shorter than this scatter row by row without sorting.
    /// Override: `RIPPLE_MIN_SORT_ROWS`
    pub min_sort_rows: usize,

    /// Below this ratio of index rows to destination rows, phase 3 claims
    /// destinations by exchange instead of partitioning them.
    /// Override: `RIPPLE_CLAIM_RATIO`
    pub claim_ratio: f64,

    /// Override: `RIPPLE_SORT_STRATEGY`
    pub sort_strategy: SortStrategy,

    /// Slices at least this long use the radix sort under `auto`.
    /// Override: `RIPPLE_RADIX_MIN_LEN`
    pub radix_min_len: usize,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.01,
            quantization_scale_log2: 30,
            min_sort_rows: 256,
            claim_ratio: 0.1,
            sort_strategy: SortStrategy::Auto,
            radix_min_len: 2048,
        }
    }
}

/// Errors that can occur when loading or validating a [`ScatterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride {
        key: String,
        value: String,
        reason: String,
    },
}

fn env_parse<T>(key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(val) = std::env::var(key) {
        *slot = val.parse::<T>().map_err(|e| ConfigError::EnvOverride {
            key: key.into(),
            value: val.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

impl ScatterConfig {
    /// Render the default configuration as TOML.
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    /// Load from a TOML file, defaulting missing fields, then apply
    /// environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut cfg: Self = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.duplicate_threshold) {
            return Err(ConfigError::Validation(format!(
                "duplicate_threshold must be within [0, 1], got {}",
                self.duplicate_threshold
            )));
        }
        if !(1..=62).contains(&self.quantization_scale_log2) {
            return Err(ConfigError::Validation(format!(
                "quantization_scale_log2 must be within 1..=62, got {}",
                self.quantization_scale_log2
            )));
        }
        if !self.claim_ratio.is_finite() || self.claim_ratio < 0.0 {
            return Err(ConfigError::Validation(format!(
                "claim_ratio must be a finite non-negative number, got {}",
                self.claim_ratio
            )));
        }
        if self.radix_min_len == 0 {
            return Err(ConfigError::Validation("radix_min_len must be > 0".into()));
        }
        Ok(())
    }

    /// Apply `RIPPLE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        env_parse("RIPPLE_DUPLICATE_THRESHOLD", &mut self.duplicate_threshold)?;
        env_parse("RIPPLE_QUANTIZATION_SCALE_LOG2", &mut self.quantization_scale_log2)?;
        env_parse("RIPPLE_MIN_SORT_ROWS", &mut self.min_sort_rows)?;
        env_parse("RIPPLE_CLAIM_RATIO", &mut self.claim_ratio)?;
        env_parse("RIPPLE_SORT_STRATEGY", &mut self.sort_strategy)?;
        env_parse("RIPPLE_RADIX_MIN_LEN", &mut self.radix_min_len)?;
        Ok(())
    }

    /// `2^quantization_scale_log2` as a float.
    #[must_use]
    pub fn quantization_scale(&self) -> f64 {
        f64::from(self.quantization_scale_log2.min(62)).exp2()
    }
}
