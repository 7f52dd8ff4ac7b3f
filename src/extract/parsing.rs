//! Prometheus HTTP API payloads → RawSample rows.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::common::error::{EtlError, EtlResult};
use crate::model::{Labels, RawSample};

const NAME_LABEL: &str = "__name__";

/// Samples parsed from one response plus the rows that had to be discarded
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedRows {
    pub samples: Vec<RawSample>,
    pub dropped: usize,
}

/// Parse a `query` or `query_range` response body.
///
/// `fallback_name` names series that carry no `__name__` label, which is the
/// case for any derived expression such as `rate(...)`.
pub fn parse_query_response(body: &str, fallback_name: &str) -> EtlResult<ParsedRows> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| EtlError::malformed_response(format!("invalid JSON: {e}")))?;

    match root.get("status").and_then(Value::as_str) {
        Some("success") => {}
        Some(status) => {
            return Err(EtlError::malformed_response(format!(
                "status {status}: {}",
                api_error_message(&root)
            )))
        }
        None => return Err(EtlError::malformed_response("missing status")),
    }

    let data = root
        .get("data")
        .ok_or_else(|| EtlError::malformed_response("missing data"))?;
    let result_type = data
        .get("resultType")
        .and_then(Value::as_str)
        .ok_or_else(|| EtlError::malformed_response("missing resultType"))?;
    let result = data
        .get("result")
        .ok_or_else(|| EtlError::malformed_response("missing result"))?;

    match result_type {
        "matrix" => Ok(parse_series(result, fallback_name, SeriesShape::Matrix)),
        "vector" => Ok(parse_series(result, fallback_name, SeriesShape::Vector)),
        "scalar" => {
            let mut rows = ParsedRows::default();
            match parse_point(result) {
                Some((timestamp, value)) => rows.samples.push(RawSample::new(
                    fallback_name,
                    Labels::new(),
                    timestamp,
                    value,
                )),
                None => rows.dropped += 1,
            }
            Ok(rows)
        }
        other => Err(EtlError::malformed_response(format!(
            "unsupported resultType {other}"
        ))),
    }
}

/// Best-effort extraction of the `error` text of an API error body
pub fn api_error_message(root: &Value) -> String {
    let kind = root.get("errorType").and_then(Value::as_str);
    let message = root.get("error").and_then(Value::as_str);
    match (kind, message) {
        (Some(kind), Some(message)) => format!("{kind}: {message}"),
        (None, Some(message)) => message.to_string(),
        (Some(kind), None) => kind.to_string(),
        (None, None) => "no error detail".to_string(),
    }
}

#[derive(Clone, Copy)]
enum SeriesShape {
    Matrix,
    Vector,
}

fn parse_series(result: &Value, fallback_name: &str, shape: SeriesShape) -> ParsedRows {
    let mut rows = ParsedRows::default();

    let Some(series_list) = result.as_array() else {
        rows.dropped += 1;
        return rows;
    };

    for series in series_list {
        let Some(mut labels) = parse_labels(series.get("metric")) else {
            rows.dropped += 1;
            continue;
        };
        let metric_name = labels
            .remove(NAME_LABEL)
            .unwrap_or_else(|| fallback_name.to_string());

        match shape {
            SeriesShape::Matrix => {
                let Some(values) = series.get("values").and_then(Value::as_array) else {
                    rows.dropped += 1;
                    continue;
                };
                for point in values {
                    match parse_point(point) {
                        Some((timestamp, value)) => rows.samples.push(RawSample::new(
                            metric_name.clone(),
                            labels.clone(),
                            timestamp,
                            value,
                        )),
                        None => rows.dropped += 1,
                    }
                }
            }
            SeriesShape::Vector => match series.get("value").and_then(parse_point) {
                Some((timestamp, value)) => {
                    rows.samples
                        .push(RawSample::new(metric_name, labels, timestamp, value))
                }
                None => rows.dropped += 1,
            },
        }
    }

    rows
}

fn parse_labels(metric: Option<&Value>) -> Option<Labels> {
    let Some(metric) = metric else {
        return Some(Labels::new());
    };

    metric
        .as_object()?
        .iter()
        .map(|(key, value)| Some((key.clone(), value.as_str()?.to_string())))
        .collect()
}

/// `[<unix seconds>, "<value>"]`
fn parse_point(point: &Value) -> Option<(DateTime<Utc>, f64)> {
    let pair = point.as_array()?;
    if pair.len() != 2 {
        return None;
    }

    let timestamp = parse_timestamp(&pair[0])?;
    let value = parse_sample_value(pair[1].as_str()?)?;
    Some((timestamp, value))
}

fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    let seconds = match raw {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.parse::<f64>().ok()?,
        _ => return None,
    };

    if !seconds.is_finite() {
        return None;
    }

    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
}

/// Prometheus encodes sample values as strings, including `NaN`, `+Inf` and `-Inf`
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    match raw.trim() {
        "NaN" => Some(f64::NAN),
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        other => other.parse::<f64>().ok(),
    }
}
