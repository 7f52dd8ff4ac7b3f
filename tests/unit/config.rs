use std::io::Write;

use health_etl::common::config::*;
use health_etl::common::retry::BackoffStrategy;
use health_etl::common::EtlError;
use tempfile::NamedTempFile;

const MINIMAL_TOML: &str = r#"
[extract]
prometheus_url = "http://prometheus:9090"

[load]
url = "http://localhost:8086"
token = "secret-token"
"#;

fn config_file(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load(file: &NamedTempFile) -> Result<RuntimeConfig, EtlError> {
    let loader = ConfigLoader::new()
        .with_file(file.path())
        .without_environment();
    RuntimeConfig::load_with_loader(&loader)
}

#[test]
fn test_minimal_file_gets_defaults() {
    let file = config_file(MINIMAL_TOML, ".toml");
    let config = load(&file).unwrap();

    assert_eq!(config.extract.prometheus_url, "http://prometheus:9090");
    assert_eq!(config.extract.timeout, 30);
    assert_eq!(config.extract.retry_attempts, 3);
    assert_eq!(config.extract.aggregation, AggregationPolicy::AnySuccess);
    assert_eq!(config.extract.queries.len(), 4);
    assert_eq!(config.transform.valid_metrics, default_valid_metrics());
    assert!(config.transform.data_cleaning.remove_duplicates);
    assert_eq!(config.load.org, "monitoring");
    assert_eq!(config.load.bucket, "health_metrics");
    assert_eq!(config.load.batch_size, 1000);
    assert_eq!(config.pipeline.interval_seconds, 300);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.monitoring.metrics_port, 9102);
}

#[test]
fn test_missing_store_url_is_rejected() {
    let file = config_file(
        r#"
[extract]
prometheus_url = "http://prometheus:9090"

[load]
token = "secret-token"
"#,
        ".toml",
    );

    assert!(load(&file).is_err());
}

#[test]
fn test_missing_backend_url_is_rejected() {
    let file = config_file(
        r#"
[load]
url = "http://localhost:8086"
token = "secret-token"
"#,
        ".toml",
    );

    assert!(load(&file).is_err());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let loader = ConfigLoader::new()
        .with_file("/nonexistent/health-etl.toml")
        .without_environment();
    let err = RuntimeConfig::load_with_loader(&loader).unwrap_err();
    assert_eq!(err.category(), "configuration");
}

#[test]
fn test_full_file_overrides_every_section() {
    let file = config_file(
        r#"
[extract]
prometheus_url = "http://prometheus:9090/"
timeout = 10
retry_attempts = 5
backoff = "fixed"
aggregation = "all_success"
lookback_minutes = 15

[[extract.queries]]
name = "up"
expr = "up"

[transform]
measurement = "svc_health"
valid_metrics = ["up", "error_rate"]
max_future_skew_seconds = 60

[transform.data_cleaning]
remove_duplicates = false

[transform.value_ranges.error_rate]
min = 0.0
max = 1.0

[load]
url = "https://influx.example.com"
token = "secret-token"
org = "ops"
bucket = "health"
batch_size = 250

[pipeline]
interval_seconds = 120
max_retries = 2
retry_delay = 3

[logging]
level = "debug"
format = "json"
max_size = "5MB"
backup_count = 2

[monitoring]
enable_metrics = false
health_window = 20
"#,
        ".toml",
    );

    let config = load(&file).unwrap();

    assert_eq!(config.extract.timeout, 10);
    assert_eq!(config.extract.backoff, BackoffStrategy::Fixed);
    assert_eq!(config.extract.aggregation, AggregationPolicy::AllSuccess);
    assert_eq!(config.extract.queries, vec![NamedQuery::new("up", "up")]);
    assert_eq!(config.extract.retry_policy().max_attempts(), 6);

    assert_eq!(config.transform.measurement, "svc_health");
    assert_eq!(config.transform.valid_metrics.len(), 2);
    assert!(!config.transform.data_cleaning.remove_duplicates);
    assert!(config.transform.data_cleaning.remove_nulls);
    let range = &config.transform.value_ranges["error_rate"];
    assert!(range.contains(0.5));
    assert!(!range.contains(1.5));

    assert_eq!(config.load.org, "ops");
    assert_eq!(config.load.batch_size, 250);
    assert_eq!(config.pipeline.interval().as_secs(), 120);
    assert_eq!(config.pipeline.retry_policy().max_retries, 2);
    assert_eq!(config.logging.format, "json");
    assert!(!config.monitoring.enable_metrics);
    assert_eq!(config.monitoring.health_window, 20);
}

#[test]
fn test_yaml_files_are_supported() {
    let file = config_file(
        r#"
extract:
  prometheus_url: "http://prometheus:9090"
load:
  url: "http://localhost:8086"
  token: "secret-token"
  batch_size: 50
"#,
        ".yaml",
    );

    let config = load(&file).unwrap();
    assert_eq!(config.load.batch_size, 50);
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        ("[pipeline]\ninterval_seconds = 0\n", "interval"),
        ("[load]\nbatch_size = 0\n", "batch size"),
        ("[logging]\nlevel = \"loud\"\n", "log level"),
        ("[logging]\nmax_size = \"ten megs\"\n", "log size"),
        ("[monitoring]\ndegraded_success_rate = 0.2\nunhealthy_success_rate = 0.5\n", "rates"),
    ];

    for (extra, label) in cases {
        let contents = format!("{MINIMAL_TOML}\n{extra}");
        // Repeated [load] tables are invalid TOML, so patch batch_size in place
        let contents = if label == "batch size" {
            MINIMAL_TOML.replace("token = \"secret-token\"", "token = \"secret-token\"\nbatch_size = 0")
        } else {
            contents
        };
        let file = config_file(&contents, ".toml");
        assert!(load(&file).is_err(), "{label} should be rejected");
    }
}

#[test]
fn test_environment_overrides_file() {
    let file = config_file(MINIMAL_TOML, ".toml");

    std::env::set_var("HEALTH_ETL_PIPELINE__INTERVAL_SECONDS", "45");
    let loader = ConfigLoader::new().with_file(file.path());
    let config = RuntimeConfig::load_with_loader(&loader);
    std::env::remove_var("HEALTH_ETL_PIPELINE__INTERVAL_SECONDS");

    assert_eq!(config.unwrap().pipeline.interval_seconds, 45);
}

#[test]
fn test_export_redacts_token() {
    let file = config_file(MINIMAL_TOML, ".toml");
    let config = load(&file).unwrap();

    let json = ConfigUtils::export_as_json(&config).unwrap();
    assert!(!json.contains("secret-token"));
    assert!(json.contains("<redacted>"));
    assert!(!format!("{:?}", config.load).contains("secret-token"));
}

#[test]
fn test_health_check_flags_risky_settings() {
    let file = config_file(MINIMAL_TOML, ".toml");
    let mut config = load(&file).unwrap();
    assert!(ConfigUtils::check_configuration_health(&config).is_empty());

    config.pipeline.interval_seconds = 10;
    config.load.url = "http://influx.example.com:8086".to_string();
    config.transform.data_cleaning.filter_unknown_metrics = false;

    let warnings = ConfigUtils::check_configuration_health(&config);
    assert_eq!(warnings.len(), 3);
}

#[test]
fn test_summary_lists_key_settings() {
    let file = config_file(MINIMAL_TOML, ".toml");
    let config = load(&file).unwrap();
    let summary = ConfigUtils::get_config_summary(&config);
    assert!(!summary.is_empty());
    assert!(summary.values().all(|v| !v.contains("secret-token")));
}

#[test]
fn test_window_bounds_are_enforced() {
    let mut extract = ExtractConfig {
        prometheus_url: "http://prometheus:9090".to_string(),
        ..ExtractConfig::default()
    };
    extract.lookback_minutes = MAX_LOOKBACK_MINUTES;
    assert!(extract.validate().is_ok());
    extract.lookback_minutes = 1_000_000_000_000;
    assert!(extract.validate().is_err());

    let mut transform = TransformConfig::default();
    transform.max_future_skew_seconds = MAX_FUTURE_SKEW_SECONDS;
    assert!(transform.validate().is_ok());
    transform.max_future_skew_seconds = 10_000_000_000_000;
    assert!(transform.validate().is_err());
    transform.max_future_skew_seconds = -1;
    assert!(transform.validate().is_err());
}
