use clap::{value_parser, Arg, ArgAction, Command};
use tracing::info;

use crate::common::config::{RuntimeConfig, DEFAULT_CONFIG_PATH};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: &str = env!("HEALTH_ETL_BUILD_TIMESTAMP");
const GIT_SHA: &str = env!("HEALTH_ETL_GIT_SHA");
const TARGET: &str = env!("HEALTH_ETL_TARGET_TRIPLE");

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_file: Option<String>,
    pub log_level: Option<String>,
    pub interval: Option<u64>,
    pub once: bool,
    pub validate_only: bool,
    pub print_config: bool,
}

fn command() -> Command {
    Command::new("health-etl")
        .version(VERSION)
        .about("Periodic ETL from a Prometheus-compatible backend into InfluxDB")
        .long_about(format!(
            "health-etl - Service Health Metrics ETL\n\
             Version: {VERSION}\n\
             Build: {BUILD_TIMESTAMP}\n\
             Git SHA: {GIT_SHA}\n\n\
             Pulls service health metrics from a Prometheus-compatible query API,\n\
             cleans and normalizes them, and writes them to an InfluxDB bucket\n\
             on a fixed schedule."
        ))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .long_help(format!(
                    "Path to the configuration file (toml, yaml or json). Defaults to {DEFAULT_CONFIG_PATH}; \
                     HEALTH_ETL_* environment variables override file values"
                )),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the configured log level"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64).range(1..))
                .help("Override the pause between cycles"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .action(ArgAction::SetTrue)
                .help("Run a single cycle and exit"),
        )
        .arg(
            Arg::new("validate")
                .long("validate")
                .action(ArgAction::SetTrue)
                .conflicts_with("once")
                .help("Validate the configuration and exit"),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .action(ArgAction::SetTrue)
                .help("Print the effective configuration (secrets redacted) and exit"),
        )
}

/// Parse command line arguments
pub fn parse_cli_args() -> CliArgs {
    args_from(command().get_matches())
}

/// Parse an explicit argument list, program name first
pub fn parse_cli_args_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Ok(args_from(command().try_get_matches_from(args)?))
}

fn args_from(matches: clap::ArgMatches) -> CliArgs {
    CliArgs {
        config_file: matches.get_one::<String>("config").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
        interval: matches.get_one::<u64>("interval").copied(),
        once: matches.get_flag("once"),
        validate_only: matches.get_flag("validate"),
        print_config: matches.get_flag("print-config"),
    }
}

/// Apply CLI overrides to configuration
pub fn apply_cli_overrides(mut config: RuntimeConfig, args: &CliArgs) -> RuntimeConfig {
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
        // An explicit level wins over a configured filter
        config.logging.env_filter = None;
    }
    if let Some(interval) = args.interval {
        config.pipeline.interval_seconds = interval;
    }
    config
}

/// Log application version and build information
pub fn print_version_info() {
    info!("⚬ health-etl {VERSION} ({GIT_SHA}, built {BUILD_TIMESTAMP} for {TARGET})");
}
