use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::cli::{apply_cli_overrides, CliArgs};
use crate::common::clock::SystemClock;
use crate::common::config::{ConfigLoader, ConfigUtils, RuntimeConfig};
use crate::common::error::{EtlError, EtlResult};
use crate::common::logging::{init_logging, log_config_validation};
use crate::monitoring::{MonitoringService, MonitoringState, PipelineMetrics};
use crate::pipeline::EtlPipeline;

/// Load configuration from file and environment, then apply CLI overrides.
///
/// Runs before the subscriber exists, so failures go to stderr.
pub fn load_and_validate_config(args: &CliArgs) -> EtlResult<RuntimeConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config_file {
        loader = loader.with_file(path);
    }

    let config = match RuntimeConfig::load_with_loader(&loader) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Failed to load configuration: {e}");
            return Err(e);
        }
    };

    let config = apply_cli_overrides(config, args);
    if let Err(e) = config.validate() {
        eprintln!("✗ Configuration is invalid after CLI overrides: {e}");
        return Err(e);
    }

    Ok(config)
}

/// Install the global subscriber from the logging section
pub fn initialize_logging(config: &RuntimeConfig) -> EtlResult<()> {
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("✗ Failed to initialize logging: {e}");
        return Err(e);
    }
    Ok(())
}

/// Log the effective configuration and any non-fatal concerns
pub fn report_configuration(config: &RuntimeConfig) {
    ConfigUtils::print_config(config);
    let warnings = ConfigUtils::check_configuration_health(config);
    log_config_validation("main", true, &warnings);
}

pub fn initialize_metrics() -> EtlResult<Arc<PipelineMetrics>> {
    PipelineMetrics::new()
        .map(Arc::new)
        .map_err(|e| EtlError::internal(format!("Failed to register pipeline metrics: {e}")))
}

/// Build and initialize the pipeline; a missing store aborts startup
pub async fn initialize_pipeline(
    config: &RuntimeConfig,
    metrics: Arc<PipelineMetrics>,
) -> EtlResult<EtlPipeline> {
    let mut pipeline = EtlPipeline::new(config.clone()).with_metrics(metrics);
    pipeline.initialize().await?;
    Ok(pipeline)
}

/// Start the health/metrics endpoints; failure to bind is not fatal
pub async fn initialize_monitoring_services(
    config: &RuntimeConfig,
    metrics: Arc<PipelineMetrics>,
    pipeline: &EtlPipeline,
) -> Vec<JoinHandle<()>> {
    let service = MonitoringService::new(MonitoringState {
        config: config.monitoring.clone(),
        interval: config.pipeline.interval(),
        metrics,
        stats: pipeline.subscribe(),
        clock: Arc::new(SystemClock),
    });

    match service.start().await {
        Ok(handles) => {
            info!("📊 Monitoring services started");
            handles
        }
        Err(e) => {
            warn!("⚠ Monitoring services unavailable: {e:#}");
            Vec::new()
        }
    }
}
