use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::config::validation::{require_non_empty, ConfigSection};
use crate::common::error::EtlResult;

pub const DEFAULT_MEASUREMENT: &str = "health_metrics";

pub fn default_valid_metrics() -> Vec<String> {
    [
        "up",
        "http_requests_total",
        "http_request_duration_seconds_bucket",
        "request_rate",
        "latency_p95",
        "error_rate",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Toggles for the individual cleaning stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCleaningConfig {
    pub remove_nulls: bool,
    pub filter_unknown_metrics: bool,
    pub validate_value_ranges: bool,
    pub remove_duplicates: bool,
    pub validate_timestamps: bool,
}

impl Default for DataCleaningConfig {
    fn default() -> Self {
        Self {
            remove_nulls: true,
            filter_unknown_metrics: true,
            validate_value_ranges: true,
            remove_duplicates: true,
            validate_timestamps: true,
        }
    }
}

impl DataCleaningConfig {
    pub fn all_disabled() -> Self {
        Self {
            remove_nulls: false,
            filter_unknown_metrics: false,
            validate_value_ranges: false,
            remove_duplicates: false,
            validate_timestamps: false,
        }
    }
}

/// Acceptable value range for a metric. `allowed` takes precedence over
/// the bounds when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allowed: Option<Vec<f64>>,
}

impl ValueRange {
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            ..Self::default()
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            allowed: None,
        }
    }

    pub fn one_of(values: &[f64]) -> Self {
        Self {
            min: None,
            max: None,
            allowed: Some(values.to_vec()),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        if let Some(allowed) = &self.allowed {
            return allowed.iter().any(|candidate| *candidate == value);
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// One day
pub const MAX_FUTURE_SKEW_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub measurement: String,
    pub valid_metrics: Vec<String>,
    pub data_cleaning: DataCleaningConfig,
    pub max_future_skew_seconds: i64,
    pub max_tag_value_length: usize,
    /// Per-metric overrides of the built-in range rules
    pub value_ranges: BTreeMap<String, ValueRange>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            measurement: DEFAULT_MEASUREMENT.to_string(),
            valid_metrics: default_valid_metrics(),
            data_cleaning: DataCleaningConfig::default(),
            max_future_skew_seconds: 300,
            max_tag_value_length: 100,
            value_ranges: BTreeMap::new(),
        }
    }
}

impl ConfigSection for TransformConfig {
    const KEY: &'static str = "transform";

    fn validate(&self) -> EtlResult<()> {
        require_non_empty("transform.measurement", &self.measurement)?;

        if !(0..=MAX_FUTURE_SKEW_SECONDS).contains(&self.max_future_skew_seconds) {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "transform.max_future_skew_seconds",
                self.max_future_skew_seconds.to_string(),
            ));
        }

        if self.max_tag_value_length == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "transform.max_tag_value_length",
                self.max_tag_value_length.to_string(),
            ));
        }

        if self.data_cleaning.filter_unknown_metrics && self.valid_metrics.is_empty() {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "transform.valid_metrics",
                "[]".to_string(),
            ));
        }

        for (metric, range) in &self.value_ranges {
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    crate::etl_bail!(crate::etl_error!(
                        invalid_config_value,
                        format!("transform.value_ranges.{metric}"),
                        format!("min {min} > max {max}"),
                    ));
                }
            }
        }

        Ok(())
    }
}
