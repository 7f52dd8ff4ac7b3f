use std::fs;
use std::io::Write;
use std::time::Duration;

use health_etl::common::config::ConfigSection;
use health_etl::common::logging::{
    init_logging, parse_size, LogFormat, LoggingConfig, PerformanceTimer, RotatingFile,
};
use tempfile::tempdir;

#[test]
fn test_log_format_parsing() {
    assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    assert_eq!("COMPACT".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    assert!("invalid".parse::<LogFormat>().is_err());
}

#[test]
fn test_size_parsing() {
    assert_eq!(parse_size("2048").unwrap(), 2048);
    assert_eq!(parse_size("512KB").unwrap(), 512 * 1024);
    assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
    assert_eq!(parse_size(" 1 GiB ").unwrap(), 1024 * 1024 * 1024);
    assert!(parse_size("").is_err());
    assert!(parse_size("0MB").is_err());
    assert!(parse_size("10 parsecs").is_err());
}

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, "info");
    assert_eq!(config.format, "pretty");
    assert_eq!(config.max_size, "10MB");
    assert_eq!(config.backup_count, 5);
    assert!(config.file.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_logging_config_validation() {
    let config = LoggingConfig {
        env_filter: Some("health_etl=debug,reqwest=warn".to_string()),
        ..LoggingConfig::default()
    };
    assert!(config.validate().is_ok());

    let config = LoggingConfig {
        format: "xml".to_string(),
        ..LoggingConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_performance_timer() {
    let timer = PerformanceTimer::start("test_operation").with_metadata("test_key", "test_value");

    std::thread::sleep(Duration::from_millis(2));
    assert!(timer.elapsed() >= Duration::from_millis(2));
    assert!(timer.finish() >= Duration::from_millis(2));
}

#[test]
fn test_rotating_file_rolls_over_at_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("etl.log");
    let file = RotatingFile::open(&path, 100, 2).unwrap();

    for i in 0..10 {
        let line = format!("{i:02}:{}\n", "x".repeat(36));
        (&file).write_all(line.as_bytes()).unwrap();
    }
    (&file).flush().unwrap();

    // 40-byte lines, 100-byte limit: two lines per file
    let active = fs::read_to_string(&path).unwrap();
    assert!(active.starts_with("08:"));
    assert_eq!(active.lines().count(), 2);

    let newest = fs::read_to_string(file.backup_path(1)).unwrap();
    assert!(newest.starts_with("06:"));
    assert!(file.backup_path(2).exists());
    assert!(!file.backup_path(3).exists());
}

#[test]
fn test_rotating_file_without_backups_truncates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("etl.log");
    let file = RotatingFile::open(&path, 50, 0).unwrap();

    (&file).write_all(&[b'a'; 40]).unwrap();
    (&file).write_all(&[b'b'; 40]).unwrap();

    assert_eq!(fs::read(&path).unwrap(), vec![b'b'; 40]);
    assert!(!file.backup_path(1).exists());
}

#[test]
fn test_rotating_file_appends_to_existing_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("etl.log");

    {
        let file = RotatingFile::open(&path, 1024, 1).unwrap();
        (&file).write_all(b"first\n").unwrap();
    }

    let file = RotatingFile::open(&path, 1024, 1).unwrap();
    (&file).write_all(b"second\n").unwrap();

    assert_eq!(fs::read_to_string(file.path()).unwrap(), "first\nsecond\n");
}

#[test]
fn test_init_logging_writes_to_file_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("etl.log");

    let config = LoggingConfig {
        format: "json".to_string(),
        file: Some(path.to_string_lossy().into_owned()),
        enable_colors: false,
        ..LoggingConfig::default()
    };

    init_logging(&config).unwrap();
    assert!(fs::read_to_string(&path)
        .unwrap()
        .contains("Logging initialized"));

    // The global subscriber can only be installed once per process
    assert!(init_logging(&config).is_err());
}
