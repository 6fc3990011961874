//! Logging and tracing setup

use crate::support::{config, tasks, FixedQuota, ScriptedFetcher};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use weather_archive_downloader::downloader::{RoundBudget, RunExecutor, RunSeed};

#[test]
fn test_env_filter_parsing() {
    let _default = EnvFilter::new("weather_archive_downloader=info");
    let _verbose = EnvFilter::new("weather_archive_downloader=debug,reqwest=warn");
    let _json = EnvFilter::new("info");
}

#[test]
fn test_json_subscriber_builds() {
    // Only one global subscriber per test binary; a second init is an error, not a panic
    let result = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("weather_archive_downloader=debug"))
        .with_test_writer()
        .try_init();
    let _ = result;

    info!(station = "725030-14732", "structured info event");
    warn!(pending = 3, "structured warning event");
    error!(error = "boom", "structured error event");
}

#[tokio::test]
async fn test_run_emits_events_inside_run_span() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("weather_archive_downloader=trace"))
        .with_test_writer()
        .try_init();

    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().failing_first("S0", 1));
    let summary = RunExecutor::new(
        config(dir.path(), 2),
        fetcher,
        FixedQuota::remaining(3),
        Arc::new(RoundBudget::new(2)),
    )
    .execute(RunSeed::Fresh(tasks(4)))
    .await
    .unwrap();

    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.deferred, 1);
    assert_eq!(summary.resolved, 1);
}
