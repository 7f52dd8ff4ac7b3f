use tokio::task::JoinHandle;
use tracing::info;

use crate::common::error::{EtlError, EtlResult};
use crate::common::logging::log_error_with_context;
use crate::pipeline::{EtlPipeline, StopHandle};

/// Wait for shutdown signals
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> EtlResult<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| EtlError::internal(format!("Failed to setup SIGTERM handler: {e}")))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| EtlError::internal(format!("Failed to setup SIGINT handler: {e}")))?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("📡 Received SIGINT shutdown signal");
        }
        _ = sigterm.recv() => {
            info!("📡 Received SIGTERM shutdown signal");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("📡 Received CTRL+C shutdown signal");
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> EtlResult<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| EtlError::internal(format!("Failed to listen for CTRL+C: {e}")))?;
    info!("📡 Received CTRL+C shutdown signal");
    Ok(())
}

/// Turn the first shutdown signal into a pipeline stop request
pub fn spawn_signal_listener(stop: StopHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            log_error_with_context(&e, "Signal handling unavailable, stopping pipeline");
        }
        stop.stop();
    })
}

/// Stop background tasks and report final statistics
pub fn perform_graceful_shutdown(pipeline: &mut EtlPipeline, handles: Vec<JoinHandle<()>>) {
    info!("⚬ Shutting down health-etl...");

    pipeline.shutdown();

    for handle in handles {
        handle.abort();
    }

    let stats = pipeline.statistics();
    info!("📊 Final statistics:");
    info!(
        "  cycles: {} run, {} succeeded, {} failed",
        stats.cycles_run, stats.cycles_succeeded, stats.cycles_failed
    );
    info!("  records processed: {}", stats.records_processed_total);
    if let Some(error) = &stats.last_error {
        info!("  last error: {}", error);
    }

    info!("✓ health-etl shutdown complete");
}
