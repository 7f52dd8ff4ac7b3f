// Structured Logging Configuration
// "A cycle that was not logged never happened"

mod rotating;

pub use rotating::RotatingFile;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::common::config::ConfigSection;
use crate::common::error::{EtlError, EtlResult};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: String,
    /// Optional log file; console output is always on
    pub file: Option<String>,
    /// Size at which the log file rotates, e.g. "10MB"
    pub max_size: String,
    /// Number of rotated log files to keep
    pub backup_count: usize,
    /// Environment filter override
    pub env_filter: Option<String>,
    pub include_targets: bool,
    pub enable_colors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
            max_size: "10MB".to_string(),
            backup_count: 5,
            env_filter: None,
            include_targets: false,
            enable_colors: true,
        }
    }
}

impl ConfigSection for LoggingConfig {
    const KEY: &'static str = "logging";

    fn validate(&self) -> EtlResult<()> {
        parse_level(&self.level)?;
        self.format.parse::<LogFormat>()?;
        parse_size(&self.max_size)?;

        if let Some(filter) = &self.env_filter {
            EnvFilter::try_new(filter).map_err(|e| {
                crate::etl_error!(invalid_config_value, "logging.env_filter", e.to_string())
            })?;
        }

        Ok(())
    }
}

/// Logging format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => {
                crate::etl_bail!(crate::etl_error!(
                    configuration,
                    format!("Invalid log format: {s}. Valid options: json, pretty, compact")
                ));
            }
        }
    }
}

fn parse_level(level: &str) -> EtlResult<Level> {
    level
        .parse::<Level>()
        .map_err(|_| crate::etl_error!(invalid_config_value, "logging.level", level))
}

/// Parse a human readable size such as `10MB`, `512 KiB` or `2048`
pub fn parse_size(raw: &str) -> EtlResult<u64> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let number: u64 = digits
        .parse()
        .map_err(|_| crate::etl_error!(invalid_config_value, "logging.max_size", raw))?;

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" | "K" | "KIB" => 1024,
        "MB" | "M" | "MIB" => 1024 * 1024,
        "GB" | "G" | "GIB" => 1024 * 1024 * 1024,
        _ => {
            return Err(crate::etl_error!(
                invalid_config_value,
                "logging.max_size",
                raw
            ))
        }
    };

    match number.checked_mul(multiplier) {
        Some(bytes) if bytes > 0 => Ok(bytes),
        _ => Err(crate::etl_error!(
            invalid_config_value,
            "logging.max_size",
            raw
        )),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn format_layer<W>(format: LogFormat, writer: W, targets: bool, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(targets)
        .with_ansi(ansi);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: &LoggingConfig) -> EtlResult<()> {
    let level = parse_level(&config.level)?;
    let format = config.format.parse::<LogFormat>()?;

    let env_filter = match &config.env_filter {
        Some(filter) => EnvFilter::try_new(filter)
            .map_err(|e| crate::etl_error!(configuration, format!("Invalid env filter: {e}")))?,
        None => {
            let directive = format!("health_etl={level}")
                .parse::<Directive>()
                .map_err(|e| {
                crate::etl_error!(configuration, format!("Invalid log directive: {e}"))
            })?;
            EnvFilter::from_default_env().add_directive(directive)
        }
    };

    let mut layers: Vec<BoxedLayer> = vec![format_layer(
        format,
        io::stdout,
        config.include_targets,
        config.enable_colors,
    )];

    if let Some(path) = &config.file {
        let max_bytes = parse_size(&config.max_size)?;
        let file = RotatingFile::open(path, max_bytes, config.backup_count).map_err(|e| {
            crate::etl_error!(configuration, format!("Failed to open log file {path}: {e}"))
        })?;
        layers.push(format_layer(
            format,
            Arc::new(file),
            config.include_targets,
            false,
        ));
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| {
            crate::etl_error!(
                configuration,
                format!("Failed to install tracing subscriber: {e}")
            )
        })?;

    tracing::info!(
        "⚬ Logging initialized with level: {}, format: {}{}",
        config.level,
        config.format,
        config
            .file
            .as_deref()
            .map(|path| format!(", file: {path}"))
            .unwrap_or_default()
    );

    Ok(())
}

/// Performance measurement helper
pub struct PerformanceTimer {
    operation: String,
    start_time: Instant,
    metadata: HashMap<String, String>,
}

impl PerformanceTimer {
    pub fn start<S: Into<String>>(operation: S) -> Self {
        Self {
            operation: operation.into(),
            start_time: Instant::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log the duration and hand it back to the caller
    pub fn finish(self) -> Duration {
        let elapsed = self.start_time.elapsed();
        tracing::info!(
            operation = self.operation,
            duration_ms = elapsed.as_millis() as u64,
            category = "performance",
            metadata = ?self.metadata
        );
        elapsed
    }
}

/// Error logging helper
pub fn log_error_with_context(error: &EtlError, context: &str) {
    match error.severity() {
        Level::ERROR => tracing::error!(
            error = %error,
            context = context,
            category = error.category(),
            retryable = error.is_retryable(),
            "Operation failed with error"
        ),
        Level::WARN => tracing::warn!(
            error = %error,
            context = context,
            category = error.category(),
            retryable = error.is_retryable(),
            "Operation failed with error"
        ),
        _ => tracing::debug!(
            error = %error,
            context = context,
            category = error.category(),
            retryable = error.is_retryable(),
            "Operation failed with error"
        ),
    }
}

/// Health check logging
pub fn log_health_check(component: &str, healthy: bool, details: Option<&str>) {
    if healthy {
        tracing::info!(
            component = component,
            status = "healthy",
            details = details,
            category = "health",
            "Health check passed"
        );
    } else {
        tracing::warn!(
            component = component,
            status = "unhealthy",
            details = details,
            category = "health",
            "Health check failed"
        );
    }
}

/// Configuration validation logging
pub fn log_config_validation(component: &str, valid: bool, warnings: &[String]) {
    if valid && warnings.is_empty() {
        tracing::info!(
            component = component,
            status = "valid",
            category = "config",
            "Configuration validation passed"
        );
    } else if valid {
        tracing::warn!(
            component = component,
            status = "valid_with_warnings",
            warnings = ?warnings,
            category = "config",
            "Configuration validation passed with warnings"
        );
    } else {
        tracing::error!(
            component = component,
            status = "invalid",
            warnings = ?warnings,
            category = "config",
            "Configuration validation failed"
        );
    }
}
