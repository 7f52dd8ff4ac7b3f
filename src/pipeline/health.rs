// Pipeline Health Classification
// "The watchers report on the health of the pipeline"

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::config::MonitoringConfig;
use crate::pipeline::stats::PipelineRunRecord;

/// Health check status levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub reasons: Vec<String>,
    pub checked_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub cycles_run: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub records_processed_total: u64,
    pub success_rate: Option<f64>,
    pub recent_success_rate: Option<f64>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub seconds_since_last_success: i64,
    pub last_error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Classify the pipeline from its run record.
///
/// The recent success rate and the time since the last success are each
/// graded against a degraded and an unhealthy threshold; the worse grade
/// wins. A pipeline that has not finished a cycle yet is healthy until the
/// staleness thresholds say otherwise.
pub fn evaluate_health(
    record: &PipelineRunRecord,
    monitoring: &MonitoringConfig,
    interval: Duration,
    now: DateTime<Utc>,
) -> HealthReport {
    let mut status = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    let recent_rate = record.recent_success_rate();
    if let Some(rate) = recent_rate {
        if rate < monitoring.unhealthy_success_rate {
            status = status.max(HealthStatus::Unhealthy);
            reasons.push(format!(
                "recent success rate {:.0}% below {:.0}%",
                rate * 100.0,
                monitoring.unhealthy_success_rate * 100.0
            ));
        } else if rate < monitoring.degraded_success_rate {
            status = status.max(HealthStatus::Degraded);
            reasons.push(format!(
                "recent success rate {:.0}% below {:.0}%",
                rate * 100.0,
                monitoring.degraded_success_rate * 100.0
            ));
        }
    }

    let staleness = record.staleness(now);
    let stale_for = staleness.to_std().unwrap_or_default();
    let unhealthy_after = monitoring.unhealthy_after(interval);
    let degraded_after = monitoring.degraded_after(interval);
    let since = if record.last_success_at.is_some() {
        "last successful cycle"
    } else {
        "start without a successful cycle"
    };

    if stale_for > unhealthy_after {
        status = status.max(HealthStatus::Unhealthy);
        reasons.push(format!(
            "{}s since {since} (limit {}s)",
            stale_for.as_secs(),
            unhealthy_after.as_secs()
        ));
    } else if stale_for > degraded_after {
        status = status.max(HealthStatus::Degraded);
        reasons.push(format!(
            "{}s since {since} (limit {}s)",
            stale_for.as_secs(),
            degraded_after.as_secs()
        ));
    }

    HealthReport {
        status,
        reasons,
        checked_at: now,
        started_at: record.started_at,
        uptime_seconds: (now - record.started_at).num_seconds().max(0),
        cycles_run: record.cycles_run,
        cycles_succeeded: record.cycles_succeeded,
        cycles_failed: record.cycles_failed,
        records_processed_total: record.records_processed_total,
        success_rate: record.success_rate(),
        recent_success_rate: recent_rate,
        last_run_at: record.last_run_at,
        last_success_at: record.last_success_at,
        seconds_since_last_success: staleness.num_seconds(),
        last_error: record.last_error.clone(),
    }
}
