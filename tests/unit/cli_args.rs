//! Command line parsing and binary smoke tests

use assert_cmd::Command;
use clap::Parser;
use std::path::PathBuf;
use weather_archive_downloader::cli::{Cli, Commands, OutputFormat};
use weather_archive_downloader::downloader::config::{
    DEFAULT_MAX_RETRY_ROUNDS, DEFAULT_RETRY_ROUND_SIZE, DEFAULT_WORKERS,
};
use weather_archive_downloader::ReportType;

#[test]
fn test_run_defaults() {
    let cli = Cli::parse_from([
        "weather-archive-downloader",
        "run",
        "--catalog",
        "stations.csv",
        "--start",
        "2016-01-01",
        "--end",
        "2016-12-31",
    ]);

    assert_eq!(cli.workers, DEFAULT_WORKERS);
    assert_eq!(cli.retry_round_size, DEFAULT_RETRY_ROUND_SIZE);
    assert_eq!(cli.max_retry_rounds, DEFAULT_MAX_RETRY_ROUNDS);
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(!cli.unattended);
    assert!(cli.requests_per_minute.is_none());

    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.catalog, PathBuf::from("stations.csv"));
    assert_eq!(
        args.report_types,
        vec![ReportType::Subhourly, ReportType::Hourly, ReportType::Daily]
    );
}

#[test]
fn test_report_types_are_comma_separated() {
    let cli = Cli::parse_from([
        "weather-archive-downloader",
        "run",
        "--catalog",
        "stations.csv",
        "--start",
        "2016-01-01",
        "--end",
        "2016-01-31",
        "--report-types",
        "daily,hourly",
    ]);
    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.report_types, vec![ReportType::Daily, ReportType::Hourly]);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::parse_from([
        "weather-archive-downloader",
        "retry-failed",
        "--unattended",
        "--max-retry-rounds",
        "3",
        "--output-format",
        "json",
        "--state-dir",
        "/tmp/weather-state",
    ]);
    assert!(matches!(cli.command, Commands::RetryFailed));
    assert!(cli.unattended);
    assert_eq!(cli.max_retry_rounds, 3);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.state_dir, PathBuf::from("/tmp/weather-state"));
}

#[test]
fn test_rejects_out_of_range_values() {
    let base = ["weather-archive-downloader", "resume"];
    for bad in [
        ["--workers", "0"],
        ["--workers", "65"],
        ["--retry-round-size", "0"],
        ["--max-retry-rounds", "0"],
        ["--fetch-timeout-secs", "0"],
    ] {
        let args = base.iter().chain(bad.iter());
        assert!(Cli::try_parse_from(args).is_err(), "{bad:?} accepted");
    }
}

#[test]
fn test_rejects_bad_dates_and_report_types() {
    let result = Cli::try_parse_from([
        "weather-archive-downloader",
        "run",
        "--catalog",
        "s.csv",
        "--start",
        "2016/01/01",
        "--end",
        "2016-01-31",
    ]);
    assert!(result.is_err());

    let result = Cli::try_parse_from([
        "weather-archive-downloader",
        "run",
        "--catalog",
        "s.csv",
        "--start",
        "2016-01-01",
        "--end",
        "2016-01-31",
        "--report-types",
        "weekly",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_binary_help_lists_commands() {
    let output = Command::cargo_bin("weather-archive-downloader")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["run", "resume", "retry-failed", "status"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_binary_status_on_empty_state_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = Command::cargo_bin("weather-archive-downloader")
        .unwrap()
        .args(["status", "--output-format", "json", "--state-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["failed"], 0);
    assert_eq!(report["deferred"], 0);
    assert!(report["completed"].is_null());
}

#[test]
fn test_binary_run_without_api_key_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let catalog = dir.path().join("stations.csv");
    std::fs::write(
        &catalog,
        "station_id,lat,lon,source,reports,country\nD1,40.7,-74.0,ghcn,daily,US\n",
    )
    .unwrap();

    Command::cargo_bin("weather-archive-downloader")
        .unwrap()
        .env_remove("WEATHERBIT_API_KEY")
        .args(["run", "--start", "2016-01-01", "--end", "2016-01-31", "--catalog"])
        .arg(&catalog)
        .arg("--state-dir")
        .arg(dir.path().join("state"))
        .assert()
        .failure();
}
