// Configuration Utilities
// "Know the shape of the rules before the first cycle runs"

use std::collections::BTreeMap;

use tracing::info;

use super::RuntimeConfig;
use crate::common::error::EtlResult;

/// Configuration utilities for debugging and validation
pub struct ConfigUtils;

impl ConfigUtils {
    /// Print current configuration in a readable format
    pub fn print_config(config: &RuntimeConfig) {
        info!("Current configuration for health-etl:");
        info!("  Prometheus: {}", config.extract.prometheus_url);
        info!(
            "  Queries: {}",
            config
                .extract
                .queries
                .iter()
                .map(|q| q.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!(
            "  Extract window: {}m @ {}s step, {} retries ({:?})",
            config.extract.lookback_minutes,
            config.extract.step,
            config.extract.retry_attempts,
            config.extract.backoff
        );
        info!("  Aggregation: {:?}", config.extract.aggregation);
        info!("  Measurement: {}", config.transform.measurement);
        info!("  ↘ Valid metrics: {}", config.transform.valid_metrics.len());
        info!("  InfluxDB: {}", config.load.url);
        info!("  Organization: {}", config.load.org);
        info!("  Bucket: {}", config.load.bucket);
        info!("  Batch size: {}", config.load.batch_size);
        info!("  Interval: {}s", config.pipeline.interval_seconds);
        info!("  Log Level: {}", config.logging.level);
        if config.monitoring.enable_metrics {
            info!("  Metrics port: {}", config.monitoring.metrics_port);
        }
    }

    /// Get configuration summary for health checks
    pub fn get_config_summary(config: &RuntimeConfig) -> BTreeMap<String, String> {
        let mut summary = BTreeMap::new();

        summary.insert(
            "prometheus_url".to_string(),
            config.extract.prometheus_url.clone(),
        );
        summary.insert("influx_url".to_string(), config.load.url.clone());
        summary.insert("org".to_string(), config.load.org.clone());
        summary.insert("bucket".to_string(), config.load.bucket.clone());
        summary.insert(
            "measurement".to_string(),
            config.transform.measurement.clone(),
        );
        summary.insert(
            "interval_seconds".to_string(),
            config.pipeline.interval_seconds.to_string(),
        );
        summary.insert(
            "batch_size".to_string(),
            config.load.batch_size.to_string(),
        );
        summary.insert("log_level".to_string(), config.logging.level.clone());
        summary.insert(
            "metrics_enabled".to_string(),
            config.monitoring.enable_metrics.to_string(),
        );

        summary
    }

    /// Export configuration as JSON with secrets masked
    pub fn export_as_json(config: &RuntimeConfig) -> EtlResult<String> {
        let mut value = serde_json::to_value(config)?;
        if let Some(token) = value.pointer_mut("/load/token") {
            *token = serde_json::Value::String("<redacted>".to_string());
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Check for common configuration issues
    pub fn check_configuration_health(config: &RuntimeConfig) -> Vec<String> {
        let mut warnings = Vec::new();

        if config.pipeline.interval_seconds < 30 {
            warnings.push(
                "Pipeline interval < 30s may overload the metrics backend".to_string(),
            );
        }

        let window_seconds = config.extract.lookback_minutes * 60;
        if config.pipeline.interval_seconds > window_seconds {
            warnings.push(format!(
                "Pipeline interval ({}s) exceeds the extraction window ({}s); samples will be missed",
                config.pipeline.interval_seconds, window_seconds
            ));
        }

        if window_seconds / config.extract.step.max(1) > 11_000 {
            warnings.push(
                "Extraction window / step exceeds 11000 points; Prometheus will reject the range query"
                    .to_string(),
            );
        }

        if config.extract.retry_attempts == 0 {
            warnings.push("Extraction retries disabled - transient failures fail the cycle".to_string());
        }

        if config.load.batch_size > 5000 {
            warnings.push("Large batch_size may exceed InfluxDB request limits".to_string());
        }

        if !config.transform.data_cleaning.remove_nulls {
            warnings.push(
                "remove_nulls disabled - non-finite values will be counted as invalid records"
                    .to_string(),
            );
        }

        if !config.transform.data_cleaning.filter_unknown_metrics {
            warnings.push("Metric whitelist disabled - every extracted series will be stored".to_string());
        }

        if config.load.url.starts_with("http://") && !is_local(&config.load.url) {
            warnings.push("InfluxDB token sent over plain HTTP to a remote host".to_string());
        }

        warnings
    }
}

fn is_local(raw: &str) -> bool {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .map(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "::1" | "[::1]"))
        .unwrap_or(false)
}
