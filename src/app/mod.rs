// health-etl - Service Health Metrics ETL
// "Extract, clean, load, sleep, repeat"

pub mod cli;
pub mod shutdown;
pub mod startup;

use tracing::{error, info};

use crate::common::config::ConfigUtils;
use crate::common::error::{EtlError, EtlResult};

use self::cli::{parse_cli_args, print_version_info};
use self::shutdown::{perform_graceful_shutdown, spawn_signal_listener};
use self::startup::{
    initialize_logging, initialize_metrics, initialize_monitoring_services, initialize_pipeline,
    load_and_validate_config, report_configuration,
};

/// Main application entry point and coordination
pub async fn run() -> EtlResult<()> {
    let args = parse_cli_args();

    let config = load_and_validate_config(&args)?;

    if args.print_config {
        println!("{}", ConfigUtils::export_as_json(&config)?);
        return Ok(());
    }

    initialize_logging(&config)?;
    print_version_info();

    report_configuration(&config);

    if args.validate_only {
        info!("✓ Configuration is valid");
        return Ok(());
    }

    let metrics = initialize_metrics()?;
    let mut pipeline = initialize_pipeline(&config, metrics.clone()).await?;

    if args.once {
        let success = pipeline.run_single_cycle().await;
        perform_graceful_shutdown(&mut pipeline, Vec::new());
        return if success {
            Ok(())
        } else {
            error!("✗ Single ETL cycle failed");
            Err(EtlError::internal("ETL cycle failed"))
        };
    }

    let mut handles = initialize_monitoring_services(&config, metrics, &pipeline).await;
    handles.push(spawn_signal_listener(pipeline.stop_handle()));

    info!("✓ health-etl is running");

    let result = pipeline.run_continuous(config.pipeline.interval()).await;
    perform_graceful_shutdown(&mut pipeline, handles);
    result
}
