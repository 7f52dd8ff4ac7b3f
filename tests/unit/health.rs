use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use health_etl::common::config::MonitoringConfig;
use health_etl::pipeline::{evaluate_health, CycleSummary, HealthStatus, PipelineRunRecord};

const INTERVAL: Duration = Duration::from_secs(60);

fn start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// One cycle per interval, `failures` of them failing (the last ones)
fn record_with(cycles: usize, failures: usize) -> (PipelineRunRecord, DateTime<Utc>) {
    let mut record = PipelineRunRecord::new(start(), 10);
    let mut at = start();

    for i in 0..cycles {
        at += ChronoDuration::seconds(60);
        let mut summary = CycleSummary::started(at);
        if i < cycles - failures {
            summary.success = true;
            summary.loaded = 5;
        } else {
            summary.error = Some(format!("load failed: batch {i}"));
        }
        record.record_cycle(summary);
    }

    (record, at)
}

#[test]
fn test_fresh_pipeline_is_healthy() {
    let record = PipelineRunRecord::new(start(), 10);
    let report = evaluate_health(&record, &MonitoringConfig::default(), INTERVAL, start());

    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.reasons.is_empty());
    assert_eq!(report.success_rate, None);
    assert_eq!(report.cycles_run, 0);
}

#[test]
fn test_success_rate_thresholds() {
    let monitoring = MonitoringConfig::default();

    let (record, _) = record_with(10, 1);
    let last_success = record.last_success_at.unwrap();
    let report = evaluate_health(&record, &monitoring, INTERVAL, last_success);
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.recent_success_rate, Some(0.9));

    let (record, _) = record_with(10, 3);
    let last_success = record.last_success_at.unwrap();
    let report = evaluate_health(&record, &monitoring, INTERVAL, last_success);
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.reasons.len(), 1);

    let (record, _) = record_with(10, 6);
    let last_success = record.last_success_at.unwrap();
    let report = evaluate_health(&record, &monitoring, INTERVAL, last_success);
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.cycles_failed, 6);
    assert_eq!(report.last_error.as_deref(), Some("load failed: batch 9"));
}

#[test]
fn test_only_recent_cycles_count() {
    let mut record = PipelineRunRecord::new(start(), 4);
    let mut at = start();
    for i in 0..12 {
        at += ChronoDuration::seconds(60);
        let mut summary = CycleSummary::started(at);
        summary.success = i >= 8;
        record.record_cycle(summary);
    }

    let report = evaluate_health(&record, &MonitoringConfig::default(), INTERVAL, at);
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.recent_success_rate, Some(1.0));
    assert!(report.success_rate.unwrap() < 0.5);
}

#[test]
fn test_staleness_thresholds() {
    let monitoring = MonitoringConfig::default();
    let (record, last) = record_with(3, 0);

    let report = evaluate_health(&record, &monitoring, INTERVAL, last + ChronoDuration::seconds(120));
    assert_eq!(report.status, HealthStatus::Healthy);

    let report = evaluate_health(&record, &monitoring, INTERVAL, last + ChronoDuration::seconds(240));
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.seconds_since_last_success, 240);

    let report = evaluate_health(&record, &monitoring, INTERVAL, last + ChronoDuration::seconds(420));
    assert_eq!(report.status, HealthStatus::Unhealthy);
}

#[test]
fn test_never_succeeding_pipeline_goes_stale_from_start() {
    let record = PipelineRunRecord::new(start(), 10);
    let now = start() + ChronoDuration::minutes(10);
    let report = evaluate_health(&record, &MonitoringConfig::default(), INTERVAL, now);

    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report.reasons[0].contains("without a successful cycle"));
    assert_eq!(report.uptime_seconds, 600);
}

#[test]
fn test_explicit_staleness_limits_win() {
    let monitoring = MonitoringConfig {
        degraded_after_seconds: Some(30),
        unhealthy_after_seconds: Some(3600),
        ..MonitoringConfig::default()
    };
    let (record, last) = record_with(2, 0);

    let report = evaluate_health(&record, &monitoring, INTERVAL, last + ChronoDuration::seconds(600));
    assert_eq!(report.status, HealthStatus::Degraded);
}

#[test]
fn test_worst_grade_wins_and_serializes_lowercase() {
    let (record, last) = record_with(10, 3);
    let report = evaluate_health(
        &record,
        &MonitoringConfig::default(),
        INTERVAL,
        last + ChronoDuration::hours(1),
    );

    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.reasons.len(), 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "unhealthy");
    assert!(HealthStatus::Degraded > HealthStatus::Healthy);
}
