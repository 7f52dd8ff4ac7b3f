// Metrics Extractor
// "Ask the backend, and ask again when it stumbles"

pub mod parsing;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::common::clock::{Clock, SystemClock};
use crate::common::config::{AggregationPolicy, ExtractConfig, NamedQuery};
use crate::common::error::{EtlError, EtlResult};
use crate::common::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::model::{ExtractionResult, QueryOutcome};

use self::parsing::{parse_query_response, ParsedRows};

pub const BASIC_METRICS_SOURCE: &str = "basic_metrics";
const RANGE_PATH: &str = "api/v1/query_range";
const INSTANT_PATH: &str = "api/v1/query";

/// Pulls samples from a Prometheus-compatible HTTP API
pub struct MetricsExtractor {
    config: ExtractConfig,
    base_url: String,
    client: Option<reqwest::Client>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
}

impl MetricsExtractor {
    pub fn new(config: ExtractConfig) -> EtlResult<Self> {
        Self::with_runtime(config, Arc::new(TokioSleeper), Arc::new(SystemClock))
    }

    pub fn with_runtime(
        config: ExtractConfig,
        sleeper: Arc<dyn Sleeper>,
        clock: Arc<dyn Clock>,
    ) -> EtlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EtlError::configuration(format!("Failed to build HTTP client: {e}")))?;

        info!(
            "⚬ Metrics extractor ready for {} ({} named queries)",
            config.prometheus_url,
            config.queries.len()
        );

        Ok(Self {
            base_url: config.prometheus_url.trim_end_matches('/').to_string(),
            retry: config.retry_policy(),
            client: Some(client),
            config,
            sleeper,
            clock,
        })
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Range query over `[start, end]` at `step` resolution
    pub async fn extract(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> ExtractionResult {
        self.range_query(query, query, query, start, end, step).await
    }

    /// Instant query evaluated at `at`, or at the backend's current time
    pub async fn extract_instant(&self, query: &str, at: Option<DateTime<Utc>>) -> ExtractionResult {
        let extracted_at = self.clock.now();
        let Some(client) = &self.client else {
            return ExtractionResult::failed(query, "extractor is closed", extracted_at, 0);
        };

        let mut params = vec![("query", query.to_string())];
        if let Some(at) = at {
            params.push(("time", unix_seconds(at)));
        }

        let label = format!("instant query '{query}'");
        self.execute(client, INSTANT_PATH, &params, query, query, &label, extracted_at)
            .await
    }

    /// Run every configured named query over the lookback window ending now
    pub async fn get_basic_metrics(&self) -> ExtractionResult {
        let end = self.clock.now();
        let Some(start) = self
            .config
            .lookback()
            .and_then(|lookback| end.checked_sub_signed(lookback))
        else {
            return ExtractionResult::failed(
                BASIC_METRICS_SOURCE,
                format!(
                    "lookback of {} minutes is out of range",
                    self.config.lookback_minutes
                ),
                end,
                0,
            );
        };
        let step = self.config.step_duration();

        info!(
            "⚬ Extracting {} named queries over the last {} minutes",
            self.config.queries.len(),
            self.config.lookback_minutes
        );

        let results = join_all(self.config.queries.iter().map(|named| {
            self.range_query(&named.expr, &named.name, &named.name, start, end, step)
        }))
        .await;

        aggregate_results(&self.config.queries, results, self.config.aggregation, end)
    }

    /// Probe the backend with an instant `up` query
    pub async fn test_connection(&self) -> bool {
        let result = self.extract_instant("up", None).await;
        if result.success {
            info!(
                "✓ Metrics backend reachable at {} ({} series up)",
                self.base_url,
                result.len()
            );
        } else {
            warn!(
                "✗ Metrics backend connection test failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result.success
    }

    /// Release the HTTP session; later calls fail without touching the network
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            info!("⚬ Metrics extractor closed");
        } else {
            debug!("Metrics extractor already closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    async fn range_query(
        &self,
        expr: &str,
        fallback_name: &str,
        source: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> ExtractionResult {
        let extracted_at = self.clock.now();

        if start >= end {
            let error = EtlError::invalid_query(format!("start {start} is not before end {end}"));
            warn!("✗ Skipping range query '{expr}': {error}");
            return ExtractionResult::failed(source, error.to_string(), extracted_at, 0);
        }

        if step.is_zero() {
            let error = EtlError::invalid_query("step must be positive");
            warn!("✗ Skipping range query '{expr}': {error}");
            return ExtractionResult::failed(source, error.to_string(), extracted_at, 0);
        }

        let Some(client) = &self.client else {
            return ExtractionResult::failed(source, "extractor is closed", extracted_at, 0);
        };

        let params = vec![
            ("query", expr.to_string()),
            ("start", unix_seconds(start)),
            ("end", unix_seconds(end)),
            ("step", step.as_secs_f64().to_string()),
        ];

        let label = format!("range query '{fallback_name}'");
        self.execute(
            client,
            RANGE_PATH,
            &params,
            fallback_name,
            source,
            &label,
            extracted_at,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        client: &reqwest::Client,
        path: &str,
        params: &[(&str, String)],
        fallback_name: &str,
        source: &str,
        label: &str,
        extracted_at: DateTime<Utc>,
    ) -> ExtractionResult {
        let url = format!("{}/{}", self.base_url, path);
        let url = url.as_str();
        let timeout = self.config.request_timeout();

        let outcome = self
            .retry
            .run(label, self.sleeper.as_ref(), move |_| {
                fetch(client, url, params, fallback_name, timeout)
            })
            .await;

        match outcome.result {
            Ok(rows) => {
                if rows.dropped > 0 {
                    warn!(
                        "⚠ {label}: dropped {} malformed rows, kept {}",
                        rows.dropped,
                        rows.samples.len()
                    );
                }
                debug!(
                    "✓ {label}: {} samples in {} attempt(s)",
                    rows.samples.len(),
                    outcome.attempts
                );
                ExtractionResult::succeeded(
                    source,
                    rows.samples,
                    extracted_at,
                    outcome.attempts,
                    rows.dropped,
                )
            }
            Err(e) => {
                crate::log_error!(e, attempts = outcome.attempts, "✗ {label} failed");
                ExtractionResult::failed(source, e.to_string(), extracted_at, outcome.attempts)
            }
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, String)],
    fallback_name: &str,
    timeout: Duration,
) -> EtlResult<ParsedRows> {
    let with_timeout = |error: reqwest::Error| {
        if error.is_timeout() {
            EtlError::timeout(format!("GET {url}"), timeout.as_millis() as u64)
        } else {
            EtlError::from(error)
        }
    };

    let response = client
        .get(url)
        .query(params)
        .send()
        .await
        .map_err(with_timeout)?;
    let status = response.status();
    let body = response.text().await.map_err(with_timeout)?;

    if status.is_client_error() {
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .map(|root| parsing::api_error_message(&root))
            .unwrap_or_else(|_| truncate(&body));
        return Err(EtlError::query_rejected(status.as_u16(), detail));
    }

    if !status.is_success() {
        return Err(EtlError::backend_unavailable(format!(
            "HTTP {status}: {}",
            truncate(&body)
        )));
    }

    parse_query_response(&body, fallback_name)
}

/// Fold per-query envelopes into one under `policy`
pub fn aggregate_results(
    queries: &[NamedQuery],
    results: Vec<ExtractionResult>,
    policy: AggregationPolicy,
    extracted_at: DateTime<Utc>,
) -> ExtractionResult {
    let mut data = Vec::new();
    let mut outcomes = Vec::with_capacity(results.len());
    let mut attempts = 0;
    let mut dropped_rows = 0;

    for (named, result) in queries.iter().zip(results) {
        attempts += result.attempts;
        dropped_rows += result.dropped_rows;
        outcomes.push(QueryOutcome {
            name: named.name.clone(),
            success: result.success,
            samples: result.data.len(),
            attempts: result.attempts,
            error: result.error.clone(),
        });
        data.extend(result.data);
    }

    let succeeded = outcomes.iter().filter(|o| o.success).count();
    let success = match policy {
        AggregationPolicy::AnySuccess => succeeded > 0,
        AggregationPolicy::AllSuccess => !outcomes.is_empty() && succeeded == outcomes.len(),
    };

    let failures: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| {
            format!(
                "{}: {}",
                o.name,
                o.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    if success && !failures.is_empty() {
        warn!(
            "⚠ {}/{} named queries failed, continuing with partial data: {}",
            failures.len(),
            outcomes.len(),
            failures.join("; ")
        );
    }

    info!(
        "{} Basic metrics: {} samples from {}/{} queries",
        if success { "✓" } else { "✗" },
        data.len(),
        succeeded,
        outcomes.len()
    );

    ExtractionResult {
        data,
        source: BASIC_METRICS_SOURCE.to_string(),
        extracted_at,
        success,
        error: (!success).then(|| {
            if failures.is_empty() {
                "no queries configured".to_string()
            } else {
                failures.join("; ")
            }
        }),
        attempts,
        dropped_rows,
        queries: outcomes,
    }
}

fn unix_seconds(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.len() <= LIMIT {
        return body.to_string();
    }
    let cut = (0..=LIMIT)
        .rev()
        .find(|idx| body.is_char_boundary(*idx))
        .unwrap_or(0);
    format!("{}...", &body[..cut])
}
