// Pipeline Orchestrator
// "One cycle at a time, until told to stop"

pub mod health;
pub mod stats;

pub use health::{evaluate_health, HealthReport, HealthStatus};
pub use stats::{CycleSummary, PipelineRunRecord};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::common::clock::{Clock, SystemClock};
use crate::common::config::{ConfigUtils, RuntimeConfig};
use crate::common::error::{EtlError, EtlResult};
use crate::common::logging::{log_config_validation, log_error_with_context, PerformanceTimer};
use crate::common::retry::{Sleeper, TokioSleeper};
use crate::extract::MetricsExtractor;
use crate::load::{InfluxConnector, Loader, StoreConnector};
use crate::monitoring::PipelineMetrics;
use crate::transform::Transformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Cooperative stop request, cheap to clone into signal handlers
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.tx.send_replace(true) {
            info!("⚬ Stop requested, the pipeline will halt at the next cycle boundary");
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

struct Components {
    extractor: MetricsExtractor,
    transformer: Transformer,
    loader: Loader,
}

/// Wires extractor → transformer → loader and schedules cycles
pub struct EtlPipeline {
    config: RuntimeConfig,
    state: PipelineState,
    components: Option<Components>,
    connector: Option<Arc<dyn StoreConnector>>,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<PipelineMetrics>>,
    stats: PipelineRunRecord,
    stats_tx: watch::Sender<PipelineRunRecord>,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl EtlPipeline {
    pub fn new(config: RuntimeConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let stats = PipelineRunRecord::new(clock.now(), config.monitoring.health_window);
        let (stats_tx, _) = watch::channel(stats.clone());
        let (stop_tx, _) = watch::channel(false);

        Self {
            config,
            state: PipelineState::Uninitialized,
            components: None,
            connector: None,
            sleeper: Arc::new(TokioSleeper),
            clock,
            metrics: None,
            stats,
            stats_tx,
            stop_tx: Arc::new(stop_tx),
        }
    }

    /// Replace the InfluxDB connector, e.g. with an in-memory store
    pub fn with_store_connector(mut self, connector: Arc<dyn StoreConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.stats = PipelineRunRecord::new(clock.now(), self.config.monitoring.health_window);
        self.stats_tx.send_replace(self.stats.clone());
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn statistics(&self) -> &PipelineRunRecord {
        &self.stats
    }

    /// Receives a fresh run record after every cycle
    pub fn subscribe(&self) -> watch::Receiver<PipelineRunRecord> {
        self.stats_tx.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn get_health_status(&self) -> HealthReport {
        evaluate_health(
            &self.stats,
            &self.config.monitoring,
            self.config.pipeline.interval(),
            self.clock.now(),
        )
    }

    /// Validate configuration, build the components and probe both backends.
    ///
    /// An unreachable metrics backend is only a warning; an unreachable store
    /// is fatal and leaves the pipeline uninitialized.
    pub async fn initialize(&mut self) -> EtlResult<()> {
        if self.state != PipelineState::Uninitialized {
            return Err(EtlError::invalid_state(
                self.state.to_string(),
                PipelineState::Uninitialized.to_string(),
            ));
        }

        info!("⚬ Initializing ETL pipeline...");

        if let Err(e) = self.config.validate() {
            log_config_validation("pipeline", false, &[e.to_string()]);
            return Err(e);
        }
        let warnings = ConfigUtils::check_configuration_health(&self.config);
        log_config_validation("pipeline", true, &warnings);

        let extractor = MetricsExtractor::with_runtime(
            self.config.extract.clone(),
            Arc::clone(&self.sleeper),
            Arc::clone(&self.clock),
        )?;
        let transformer =
            Transformer::with_clock(self.config.transform.clone(), Arc::clone(&self.clock));
        let connector = self.connector.clone().unwrap_or_else(|| {
            Arc::new(InfluxConnector::new(self.config.load.clone())) as Arc<dyn StoreConnector>
        });
        let mut loader = Loader::with_connector(
            self.config.load.clone(),
            self.config.pipeline.retry_policy(),
            connector,
            Arc::clone(&self.sleeper),
        );

        if !extractor.test_connection().await {
            warn!(
                "⚠ Metrics backend at {} is not reachable yet; cycles will retry",
                self.config.extract.prometheus_url
            );
        }

        if !loader.test_connection().await {
            let error = EtlError::store_connection(format!(
                "time-series store at {} is unreachable",
                self.config.load.url
            ));
            log_error_with_context(&error, "pipeline initialization");
            return Err(error);
        }

        self.components = Some(Components {
            extractor,
            transformer,
            loader,
        });
        self.state = PipelineState::Initialized;
        info!("✓ ETL pipeline initialized");
        Ok(())
    }

    /// Run extract → transform → load once and record the outcome
    pub async fn run_single_cycle(&mut self) -> bool {
        let Some(components) = self.components.as_mut() else {
            warn!(
                "✗ Cannot run a cycle while the pipeline is {}",
                self.state
            );
            return false;
        };

        let cycle = self.stats.cycles_run + 1;
        let timer = PerformanceTimer::start("etl_cycle").with_metadata("cycle", cycle.to_string());
        let mut summary = CycleSummary::started(self.clock.now());

        info!("⚬ Starting ETL cycle #{cycle}");

        let extraction = components.extractor.get_basic_metrics().await;
        summary.extracted = extraction.len();
        debug!(
            "Extraction finished after {}ms ({} samples)",
            timer.elapsed().as_millis(),
            summary.extracted
        );

        if !extraction.success {
            let message = format!(
                "extraction failed: {}",
                extraction.error.as_deref().unwrap_or("unknown error")
            );
            error!("✗ {message}");
            summary.error = Some(message);
        } else {
            let output = components.transformer.transform(&extraction.data);
            summary.transformed = output.records.len();
            summary.dropped_by_stage = output
                .report
                .drops_by_stage()
                .iter()
                .map(|(stage, count)| (stage.to_string(), *count))
                .collect();

            if output.records.is_empty() {
                info!("⚬ Nothing to load this cycle");
                summary.success = true;
            } else {
                let report = components.loader.load(&output.records).await;
                summary.loaded = report.records_written;
                summary.success = report.success();
                if let Some(error) = report.error {
                    summary.error = Some(format!("load failed: {error}"));
                }
            }
        }

        summary.duration_ms = timer.finish().as_millis() as u64;

        if summary.success {
            info!(
                "✓ Cycle complete: extracted {}, transformed {}, loaded {} in {}ms",
                summary.extracted, summary.transformed, summary.loaded, summary.duration_ms
            );
        } else {
            warn!(
                "✗ Cycle failed after {}ms: {}",
                summary.duration_ms,
                summary.error.as_deref().unwrap_or("unknown error")
            );
        }

        let success = summary.success;
        if let Some(metrics) = &self.metrics {
            metrics.observe_cycle(&summary);
        }
        self.stats.record_cycle(summary);
        self.stats_tx.send_replace(self.stats.clone());

        success
    }

    /// Loop cycles with a fixed `interval` pause after each one until stopped.
    ///
    /// Stop requests are checked before every cycle and cut the pause short;
    /// a cycle in flight always completes.
    pub async fn run_continuous(&mut self, interval: Duration) -> EtlResult<()> {
        if self.state != PipelineState::Initialized {
            return Err(EtlError::invalid_state(
                self.state.to_string(),
                PipelineState::Initialized.to_string(),
            ));
        }

        self.state = PipelineState::Running;
        info!("⚬ Pipeline running every {}s", interval.as_secs());

        let mut stop_rx = self.stop_tx.subscribe();
        let sleeper = Arc::clone(&self.sleeper);

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }

            self.run_single_cycle().await;

            if *stop_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = sleeper.sleep(interval) => {}
                _ = stop_rx.changed() => {}
            }
        }

        info!(
            "⚬ Pipeline stopping after {} cycles ({} failed)",
            self.stats.cycles_run, self.stats.cycles_failed
        );
        self.shutdown();
        Ok(())
    }

    /// Close components and mark the pipeline stopped; idempotent
    pub fn shutdown(&mut self) {
        if let Some(components) = self.components.as_mut() {
            components.extractor.close();
            components.loader.close();
        }
        if self.state != PipelineState::Stopped {
            self.state = PipelineState::Stopped;
            info!("⚬ Pipeline stopped");
        }
    }
}
