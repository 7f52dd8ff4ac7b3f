// Health and Metrics Endpoints
// "The watchers report on the health of the pipeline"

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::common::clock::Clock;
use crate::common::config::MonitoringConfig;
use crate::common::logging::log_health_check;
use crate::monitoring::metrics::PipelineMetrics;
use crate::pipeline::{evaluate_health, HealthReport, HealthStatus, PipelineRunRecord};

/// Shared state behind the HTTP handlers
pub struct MonitoringState {
    pub config: MonitoringConfig,
    pub interval: Duration,
    pub metrics: Arc<PipelineMetrics>,
    pub stats: watch::Receiver<PipelineRunRecord>,
    pub clock: Arc<dyn Clock>,
}

impl MonitoringState {
    pub fn health_report(&self) -> HealthReport {
        let record = self.stats.borrow().clone();
        evaluate_health(&record, &self.config, self.interval, self.clock.now())
    }
}

/// Liveness probe response
#[derive(Debug, Clone, Serialize)]
pub struct LivenessResponse {
    pub alive: bool,
    pub timestamp: i64,
}

/// Serves `/health`, `/health/live` and `/metrics`, and logs health periodically
pub struct MonitoringService {
    state: Arc<MonitoringState>,
}

impl MonitoringService {
    pub fn new(state: MonitoringState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Start the HTTP server (when enabled) and the background health logger
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();

        if self.state.config.enable_metrics {
            let addr = format!("0.0.0.0:{}", self.state.config.metrics_port);
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind monitoring server to {addr}"))?;

            info!("⚕ Monitoring server starting on {}", addr);

            let app = self.router();
            handles.push(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    error!("Monitoring server error: {}", e);
                }
            }));
        } else {
            info!("📊 Metrics endpoint disabled in configuration");
        }

        let state = Arc::clone(&self.state);
        handles.push(tokio::spawn(async move {
            background_health_monitor(state).await;
        }));

        Ok(handles)
    }
}

async fn background_health_monitor(state: Arc<MonitoringState>) {
    let mut ticker = tokio::time::interval(state.config.health_check_period());
    // First tick fires immediately; skip it so the first report follows a cycle
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let report = state.health_report();
        let details = if report.reasons.is_empty() {
            format!(
                "{} cycles, {} records loaded",
                report.cycles_run, report.records_processed_total
            )
        } else {
            report.reasons.join("; ")
        };
        log_health_check("pipeline", report.is_healthy(), Some(&details));
    }
}

async fn health_handler(State(state): State<Arc<MonitoringState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health_report();
    let code = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (code, Json(report))
}

async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        alive: true,
        timestamp: Utc::now().timestamp(),
    })
}

async fn metrics_handler(State(state): State<Arc<MonitoringState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
