// Pipeline Metrics
// "Counting every cycle, every record that made it through"

use anyhow::Result;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use crate::pipeline::stats::CycleSummary;

/// Prometheus collectors describing the pipeline itself
pub struct PipelineMetrics {
    registry: Registry,
    pub cycles_total: IntCounterVec,
    pub records_extracted: IntCounter,
    pub records_loaded: IntCounter,
    pub records_dropped: IntCounterVec,
    pub cycle_duration: Histogram,
    pub last_success_timestamp: Gauge,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self> {
        let metrics = Self {
            registry: Registry::new(),
            cycles_total: IntCounterVec::new(
                Opts::new("health_etl_cycles_total", "ETL cycles by outcome"),
                &["outcome"],
            )?,
            records_extracted: IntCounter::new(
                "health_etl_records_extracted_total",
                "Raw samples extracted from the metrics backend",
            )?,
            records_loaded: IntCounter::new(
                "health_etl_records_loaded_total",
                "Canonical records written to the store",
            )?,
            records_dropped: IntCounterVec::new(
                Opts::new(
                    "health_etl_records_dropped_total",
                    "Samples dropped during transformation",
                ),
                &["stage"],
            )?,
            cycle_duration: Histogram::with_opts(
                HistogramOpts::new(
                    "health_etl_cycle_duration_seconds",
                    "Duration of a complete ETL cycle",
                )
                .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
            )?,
            last_success_timestamp: Gauge::new(
                "health_etl_last_success_timestamp_seconds",
                "Unix time of the last successful cycle",
            )?,
        };

        metrics.register()?;
        Ok(metrics)
    }

    fn register(&self) -> Result<()> {
        self.registry
            .register(Box::new(self.cycles_total.clone()))?;
        self.registry
            .register(Box::new(self.records_extracted.clone()))?;
        self.registry
            .register(Box::new(self.records_loaded.clone()))?;
        self.registry
            .register(Box::new(self.records_dropped.clone()))?;
        self.registry
            .register(Box::new(self.cycle_duration.clone()))?;
        self.registry
            .register(Box::new(self.last_success_timestamp.clone()))?;
        Ok(())
    }

    pub fn observe_cycle(&self, summary: &CycleSummary) {
        let outcome = if summary.success { "success" } else { "failure" };
        self.cycles_total.with_label_values(&[outcome]).inc();
        self.records_extracted.inc_by(summary.extracted as u64);
        self.records_loaded.inc_by(summary.loaded as u64);
        self.cycle_duration
            .observe(summary.duration_ms as f64 / 1000.0);

        for (stage, count) in &summary.dropped_by_stage {
            if *count > 0 {
                self.records_dropped
                    .with_label_values(&[stage.as_str()])
                    .inc_by(*count as u64);
            }
        }

        if summary.success {
            self.last_success_timestamp
                .set(summary.started_at.timestamp() as f64);
        }
    }

    /// Prometheus text exposition of every collector
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
