use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::config::validation::{require_http_url, require_non_empty, ConfigSection};
use crate::common::error::EtlResult;
use crate::common::retry::{BackoffStrategy, RetryPolicy};

/// Thirty days
pub const MAX_LOOKBACK_MINUTES: u64 = 30 * 24 * 60;

/// How `get_basic_metrics` folds per-query outcomes into one verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Success when at least one named query succeeded
    #[default]
    AnySuccess,
    /// Success only when every named query succeeded
    AllSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    pub expr: String,
}

impl NamedQuery {
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
        }
    }
}

pub fn default_queries() -> Vec<NamedQuery> {
    vec![
        NamedQuery::new("up", r#"up{job="test-app"}"#),
        NamedQuery::new("request_rate", "rate(http_requests_total[5m])"),
        NamedQuery::new(
            "latency_p95",
            "histogram_quantile(0.95, rate(http_request_duration_seconds_bucket[5m]))",
        ),
        NamedQuery::new("error_rate", r#"rate(http_requests_total{status=~"5.."}[5m])"#),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub prometheus_url: String,
    /// Per-request timeout in seconds
    pub timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub backoff: BackoffStrategy,
    /// Range query resolution in seconds
    pub step: u64,
    pub lookback_minutes: u64,
    pub aggregation: AggregationPolicy,
    pub queries: Vec<NamedQuery>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            prometheus_url: String::new(),
            timeout: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
            backoff: BackoffStrategy::Exponential,
            step: 15,
            lookback_minutes: 60,
            aggregation: AggregationPolicy::AnySuccess,
            queries: default_queries(),
        }
    }
}

impl ExtractConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_secs(self.step)
    }

    /// `None` when the window does not fit a `TimeDelta`
    pub fn lookback(&self) -> Option<chrono::TimeDelta> {
        i64::try_from(self.lookback_minutes)
            .ok()
            .and_then(chrono::TimeDelta::try_minutes)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms.max(self.retry_delay_ms)),
            strategy: self.backoff,
        }
    }
}

impl ConfigSection for ExtractConfig {
    const KEY: &'static str = "extract";

    fn validate(&self) -> EtlResult<()> {
        require_http_url("extract.prometheus_url", &self.prometheus_url)?;

        if self.timeout == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "extract.timeout",
                self.timeout.to_string(),
            ));
        }

        if self.step == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "extract.step",
                self.step.to_string(),
            ));
        }

        if self.lookback_minutes == 0 || self.lookback_minutes > MAX_LOOKBACK_MINUTES {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "extract.lookback_minutes",
                self.lookback_minutes.to_string(),
            ));
        }

        if self.queries.is_empty() {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "extract.queries",
                "[]".to_string(),
            ));
        }

        for query in &self.queries {
            require_non_empty("extract.queries.name", &query.name)?;
            require_non_empty("extract.queries.expr", &query.expr)?;
        }

        Ok(())
    }
}
