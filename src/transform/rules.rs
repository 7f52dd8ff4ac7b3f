use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::common::config::ValueRange;

const NON_NEGATIVE_METRICS: &[&str] = &[
    "request_rate",
    "latency_p95",
    "error_rate",
    "http_requests_total",
    "http_request_duration_seconds_bucket",
];

const NON_NEGATIVE_SUFFIXES: &[&str] = &["_rate", "_total", "_seconds", "_bucket", "_count", "_sum"];

const PERCENT_SUFFIXES: &[&str] = &["_percent", "_percentage"];

/// Value range rules: configured overrides first, then the built-ins
#[derive(Debug, Clone, Default)]
pub struct RangeRules {
    overrides: BTreeMap<String, ValueRange>,
}

impl RangeRules {
    pub fn new(overrides: BTreeMap<String, ValueRange>) -> Self {
        Self { overrides }
    }

    pub fn rule_for(&self, metric_name: &str) -> Option<Cow<'_, ValueRange>> {
        if let Some(range) = self.overrides.get(metric_name) {
            return Some(Cow::Borrowed(range));
        }
        builtin_rule(metric_name).map(Cow::Owned)
    }

    /// Metrics without any rule accept every value
    pub fn allows(&self, metric_name: &str, value: f64) -> bool {
        self.rule_for(metric_name)
            .map_or(true, |range| range.contains(value))
    }
}

fn builtin_rule(metric_name: &str) -> Option<ValueRange> {
    if metric_name == "up" {
        return Some(ValueRange::one_of(&[0.0, 1.0]));
    }

    if PERCENT_SUFFIXES
        .iter()
        .any(|suffix| metric_name.ends_with(suffix))
    {
        return Some(ValueRange::between(0.0, 100.0));
    }

    let non_negative = NON_NEGATIVE_METRICS.contains(&metric_name)
        || NON_NEGATIVE_SUFFIXES
            .iter()
            .any(|suffix| metric_name.ends_with(suffix))
        || metric_name.starts_with("latency");

    non_negative.then(|| ValueRange::at_least(0.0))
}
