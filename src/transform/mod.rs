// Data Transformer
// "Only clean samples cross the river"

pub mod rules;


use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::clock::{Clock, SystemClock};
use crate::common::config::TransformConfig;
use crate::common::error::EtlResult;
use crate::model::{
    CanonicalRecord, Labels, RawSample, INSTANCE_LABEL, INSTANCE_TAG, JOB_LABEL,
    METRIC_TYPE_TAG, SERVICE_TAG, UNKNOWN, VALUE_FIELD,
};

use self::rules::RangeRules;

/// Per-stage accounting of one `transform` call. Every dropped sample is
/// counted in exactly one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub input: usize,
    pub output: usize,
    pub null_values: usize,
    pub unknown_metric: usize,
    pub out_of_range: usize,
    pub duplicate: usize,
    pub future_timestamp: usize,
    pub invalid_record: usize,
}

impl TransformReport {
    pub fn dropped(&self) -> usize {
        self.drops_by_stage().iter().map(|(_, count)| count).sum()
    }

    pub fn drops_by_stage(&self) -> [(&'static str, usize); 6] {
        [
            ("null_values", self.null_values),
            ("unknown_metric", self.unknown_metric),
            ("out_of_range", self.out_of_range),
            ("duplicate", self.duplicate),
            ("future_timestamp", self.future_timestamp),
            ("invalid_record", self.invalid_record),
        ]
    }

    /// Share of input samples that became records; 1.0 for empty input
    pub fn success_rate(&self) -> f64 {
        if self.input == 0 {
            1.0
        } else {
            self.output as f64 / self.input as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub records: Vec<CanonicalRecord>,
    pub report: TransformReport,
}

/// Cleans raw samples and reshapes them into canonical records
pub struct Transformer {
    config: TransformConfig,
    valid_metrics: HashSet<String>,
    rules: RangeRules,
    clock: Arc<dyn Clock>,
}

impl Transformer {
    pub fn new(config: TransformConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TransformConfig, clock: Arc<dyn Clock>) -> Self {
        let valid_metrics = config.valid_metrics.iter().cloned().collect();
        let rules = RangeRules::new(config.value_ranges.clone());

        Self {
            config,
            valid_metrics,
            rules,
            clock,
        }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn transform(&self, raw: &[RawSample]) -> TransformOutput {
        let mut report = TransformReport {
            input: raw.len(),
            ..TransformReport::default()
        };

        if raw.is_empty() {
            debug!("No samples to transform");
            return TransformOutput {
                records: Vec::new(),
                report,
            };
        }

        let cleaning = self.config.data_cleaning;
        let now = self.clock.now();
        let mut samples: Vec<&RawSample> = raw.iter().collect();

        if cleaning.remove_nulls {
            report.null_values = retain_counted(&mut samples, |s| {
                s.value.is_finite() && after_epoch(s.timestamp)
            });
        }

        if cleaning.filter_unknown_metrics {
            report.unknown_metric = retain_counted(&mut samples, |s| {
                self.valid_metrics.contains(&s.metric_name)
            });
        }

        if cleaning.validate_value_ranges {
            report.out_of_range =
                retain_counted(&mut samples, |s| self.rules.allows(&s.metric_name, s.value));
        }

        if cleaning.remove_duplicates {
            let mut seen: HashSet<(DateTime<Utc>, &str, &Labels)> = HashSet::new();
            report.duplicate = retain_counted(&mut samples, |&sample| {
                seen.insert((sample.timestamp, sample.metric_name.as_str(), &sample.labels))
            });
        }

        if cleaning.validate_timestamps {
            let limit = future_limit(now, self.config.max_future_skew_seconds);
            report.future_timestamp = retain_counted(&mut samples, |s| s.timestamp <= limit);
        }

        let mut records = Vec::with_capacity(samples.len());
        for sample in samples {
            match self.to_record(sample) {
                Ok(record) => records.push(record),
                Err(e) => {
                    report.invalid_record += 1;
                    debug!(
                        metric = sample.metric_name.as_str(),
                        "Dropping sample that violates record invariants: {e}"
                    );
                }
            }
        }

        // Tag filtering can fold distinct samples onto one series point
        if cleaning.remove_duplicates {
            let mut seen: HashSet<(String, BTreeMap<String, String>, DateTime<Utc>)> =
                HashSet::new();
            report.duplicate += retain_counted(&mut records, |record| {
                seen.insert((
                    record.measurement().to_string(),
                    record.tags().clone(),
                    record.timestamp(),
                ))
            });
        }

        report.output = records.len();

        if report.dropped() > 0 {
            info!(
                "⚬ Transformed {} → {} records (dropped: {})",
                report.input,
                report.output,
                report
                    .drops_by_stage()
                    .iter()
                    .filter(|(_, count)| *count > 0)
                    .map(|(stage, count)| format!("{stage}={count}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        } else {
            info!("✓ Transformed {} records", report.output);
        }

        if report.output == 0 {
            warn!("⚠ No records remaining after cleaning");
        }

        TransformOutput { records, report }
    }

    /// Map one sample onto the store schema
    pub fn to_record(&self, sample: &RawSample) -> EtlResult<CanonicalRecord> {
        let mut tags = BTreeMap::new();

        for (key, value) in &sample.labels {
            if key == JOB_LABEL || key == INSTANCE_LABEL {
                continue;
            }
            if key.is_empty() || value.is_empty() || value.len() >= self.config.max_tag_value_length
            {
                continue;
            }
            tags.insert(key.clone(), value.clone());
        }

        tags.insert(
            SERVICE_TAG.to_string(),
            label_or_unknown(&sample.labels, JOB_LABEL),
        );
        tags.insert(
            INSTANCE_TAG.to_string(),
            label_or_unknown(&sample.labels, INSTANCE_LABEL),
        );
        tags.insert(METRIC_TYPE_TAG.to_string(), sample.metric_name.clone());

        let fields = BTreeMap::from([(VALUE_FIELD.to_string(), sample.value)]);

        CanonicalRecord::new(
            self.config.measurement.clone(),
            tags,
            fields,
            sample.timestamp,
        )
    }
}

/// `Vec::retain` that reports how many elements were removed
fn retain_counted<T, F>(items: &mut Vec<T>, mut keep: F) -> usize
where
    F: FnMut(&T) -> bool,
{
    let before = items.len();
    items.retain(|item| keep(item));
    before - items.len()
}

/// Latest accepted timestamp; an unrepresentable skew disables the cutoff
fn future_limit(now: DateTime<Utc>, skew_seconds: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(skew_seconds)
        .and_then(|skew| now.checked_add_signed(skew))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn after_epoch(timestamp: DateTime<Utc>) -> bool {
    timestamp > DateTime::<Utc>::UNIX_EPOCH
}

fn label_or_unknown(labels: &Labels, key: &str) -> String {
    labels
        .get(key)
        .filter(|value| !value.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN.to_string())
}
