// Pipeline Data Model
// "Raw in, canonical out"

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::{EtlError, EtlResult};

/// Sorted label set of a series
pub type Labels = BTreeMap<String, String>;

pub const SERVICE_TAG: &str = "service";
pub const INSTANCE_TAG: &str = "instance";
pub const METRIC_TYPE_TAG: &str = "metric_type";
pub const VALUE_FIELD: &str = "value";

pub const JOB_LABEL: &str = "job";
pub const INSTANCE_LABEL: &str = "instance";
pub const UNKNOWN: &str = "unknown";

/// One observation returned by the metrics backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub metric_name: String,
    pub labels: Labels,
    pub timestamp: DateTime<Utc>,
    /// May be NaN or infinite; the transformer filters those out
    pub value: f64,
}

impl RawSample {
    pub fn new(
        metric_name: impl Into<String>,
        labels: Labels,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            labels,
            timestamp,
            value,
        }
    }

    /// Rebuild the sample a record was derived from.
    ///
    /// `service` and `instance` go back to the `job` and `instance` labels,
    /// `metric_type` becomes the metric name and every other tag is kept as
    /// a label.
    pub fn from_record(record: &CanonicalRecord) -> Self {
        let mut labels = Labels::new();

        for (key, value) in record.tags() {
            match key.as_str() {
                SERVICE_TAG => {
                    labels.insert(JOB_LABEL.to_string(), value.clone());
                }
                INSTANCE_TAG => {
                    labels.insert(INSTANCE_LABEL.to_string(), value.clone());
                }
                METRIC_TYPE_TAG => {}
                _ => {
                    labels.insert(key.clone(), value.clone());
                }
            }
        }

        Self {
            metric_name: record
                .tags()
                .get(METRIC_TYPE_TAG)
                .cloned()
                .unwrap_or_else(|| record.measurement().to_string()),
            labels,
            timestamp: record.timestamp(),
            value: record.value().unwrap_or(f64::NAN),
        }
    }
}

/// Cleaned, store-ready representation of a sample.
///
/// Only constructible through [`CanonicalRecord::new`], which guarantees a
/// non-empty measurement, no empty tag keys, at least one field with every
/// field finite, and a timestamp after the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, f64>,
    timestamp: DateTime<Utc>,
}

impl CanonicalRecord {
    pub fn new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, f64>,
        timestamp: DateTime<Utc>,
    ) -> EtlResult<Self> {
        let measurement = measurement.into();

        if measurement.trim().is_empty() {
            return Err(EtlError::data_validation("measurement is empty"));
        }

        if tags.keys().any(|key| key.is_empty()) {
            return Err(EtlError::data_validation(format!(
                "empty tag key in {measurement}"
            )));
        }

        if fields.is_empty() {
            return Err(EtlError::data_validation(format!(
                "no fields in {measurement}"
            )));
        }

        if let Some((name, value)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(EtlError::data_validation(format!(
                "non-finite field {name}={value} in {measurement}"
            )));
        }

        if timestamp.timestamp_nanos_opt().map_or(true, |nanos| nanos <= 0) {
            return Err(EtlError::data_validation(format!(
                "timestamp {timestamp} is not after the Unix epoch"
            )));
        }

        Ok(Self {
            measurement,
            tags,
            fields,
            timestamp,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, f64> {
        &self.fields
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self) -> Option<f64> {
        self.fields.get(VALUE_FIELD).copied()
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Outcome of a single named query inside an aggregate extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub name: String,
    pub success: bool,
    pub samples: usize,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Envelope returned by every extractor call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub data: Vec<RawSample>,
    pub source: String,
    pub extracted_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    /// Backend calls made
    pub attempts: u32,
    /// Result rows discarded as malformed
    pub dropped_rows: usize,
    pub queries: Vec<QueryOutcome>,
}

impl ExtractionResult {
    pub fn succeeded(
        source: impl Into<String>,
        data: Vec<RawSample>,
        extracted_at: DateTime<Utc>,
        attempts: u32,
        dropped_rows: usize,
    ) -> Self {
        Self {
            data,
            source: source.into(),
            extracted_at,
            success: true,
            error: None,
            attempts,
            dropped_rows,
            queries: Vec::new(),
        }
    }

    pub fn failed(
        source: impl Into<String>,
        error: impl Into<String>,
        extracted_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self {
            data: Vec::new(),
            source: source.into(),
            extracted_at,
            success: false,
            error: Some(error.into()),
            attempts,
            dropped_rows: 0,
            queries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
