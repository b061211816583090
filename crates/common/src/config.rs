//! Assertion configuration
//!
//! [`AssertionDefaults`] is the process-wide baseline; it is built explicitly
//! (or read from a TOML file) and handed to whoever runs assertions.
//! [`AssertionOptions`] carries per-call overrides; any field left `None`
//! falls back to the defaults in [`AssertionOptions::resolve`].

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pagination::DEFAULT_FETCH_SIZE;
use crate::performance::Positivity;

/// Baseline assertion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssertionDefaults {
    /// Page size when draining result sets
    pub fetch_size: usize,

    /// Queries at or above this many seconds are too slow
    pub performance_limit_in_seconds: f64,

    pub positivity: Positivity,

    /// A failed critical step stops the remaining steps
    pub critical_step: bool,

    /// Include the actual rows in reports
    pub show_actual_result: bool,

    /// Include the expected rows in reports
    pub show_expected_result: bool,
}

impl Default for AssertionDefaults {
    fn default() -> Self {
        Self {
            fetch_size: DEFAULT_FETCH_SIZE,
            performance_limit_in_seconds: 1.0,
            positivity: Positivity::Positive,
            critical_step: false,
            show_actual_result: true,
            show_expected_result: true,
        }
    }
}

impl AssertionDefaults {
    /// Parse defaults from TOML; missing keys keep their default values
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let defaults: Self = toml::from_str(content)?;
        defaults.validate()?;
        Ok(defaults)
    }

    /// Load defaults from a TOML file; parse and validation failures name the file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Io(e) => Error::Io(e),
            other => Error::InvalidConfig(format!("{}: {}", path.display(), other)),
        })
    }

    pub fn validate(&self) -> Result<()> {
        check_fetch_size(self.fetch_size)?;
        check_limit(self.performance_limit_in_seconds)?;
        Ok(())
    }

    /// Layer `overrides` on top of these defaults, producing new defaults
    pub fn merged(&self, overrides: &AssertionOptions) -> Result<Self> {
        let resolved = overrides.resolve(self)?;
        Ok(Self {
            fetch_size: resolved.fetch_size,
            performance_limit_in_seconds: resolved.performance_limit.as_secs_f64(),
            positivity: resolved.positivity,
            critical_step: resolved.critical_step,
            show_actual_result: resolved.show_actual_result,
            show_expected_result: resolved.show_expected_result,
        })
    }
}

/// Per-call overrides; `None` means "use the default"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssertionOptions {
    pub fetch_size: Option<usize>,
    pub performance_limit_in_seconds: Option<f64>,
    pub positivity: Option<Positivity>,
    pub critical_step: Option<bool>,
    pub show_actual_result: Option<bool>,
    pub show_expected_result: Option<bool>,
    /// Free-form context attached to the report
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl AssertionOptions {
    pub fn positivity(mut self, positivity: Positivity) -> Self {
        self.positivity = Some(positivity);
        self
    }

    pub fn performance_limit(mut self, seconds: f64) -> Self {
        self.performance_limit_in_seconds = Some(seconds);
        self
    }

    pub fn fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical_step = Some(critical);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Fill unset fields from `defaults` and validate the result
    pub fn resolve(&self, defaults: &AssertionDefaults) -> Result<ResolvedOptions> {
        let fetch_size = self.fetch_size.unwrap_or(defaults.fetch_size);
        check_fetch_size(fetch_size)?;

        let limit = self
            .performance_limit_in_seconds
            .unwrap_or(defaults.performance_limit_in_seconds);
        check_limit(limit)?;

        Ok(ResolvedOptions {
            fetch_size,
            performance_limit: Duration::from_secs_f64(limit),
            positivity: self.positivity.unwrap_or(defaults.positivity),
            critical_step: self.critical_step.unwrap_or(defaults.critical_step),
            show_actual_result: self.show_actual_result.unwrap_or(defaults.show_actual_result),
            show_expected_result: self
                .show_expected_result
                .unwrap_or(defaults.show_expected_result),
            attributes: self.attributes.clone(),
        })
    }
}

/// Fully resolved settings for one assertion call
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub fetch_size: usize,
    pub performance_limit: Duration,
    pub positivity: Positivity,
    pub critical_step: bool,
    pub show_actual_result: bool,
    pub show_expected_result: bool,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

fn check_fetch_size(fetch_size: usize) -> Result<()> {
    if fetch_size == 0 {
        return Err(Error::InvalidFetchSize(fetch_size));
    }
    Ok(())
}

fn check_limit(seconds: f64) -> Result<()> {
    // Duration::from_secs_f64 panics on overflow, so bound it here
    if !seconds.is_finite() || seconds <= 0.0 || seconds > u32::MAX as f64 {
        return Err(Error::InvalidPerformanceLimit(seconds));
    }
    Ok(())
}
