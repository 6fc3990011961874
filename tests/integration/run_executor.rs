//! End-to-end runs of the executor against scripted collaborators

use crate::support::{config, tasks, FixedQuota, ScriptedFetcher};
use std::sync::Arc;
use tempfile::TempDir;
use weather_archive_downloader::catalog::CatalogEntry;
use weather_archive_downloader::downloader::task::generate_tasks;
use weather_archive_downloader::downloader::{DownloadError, RoundBudget, RunExecutor, RunSeed};
use weather_archive_downloader::quota::QuotaError;
use weather_archive_downloader::resume::{CheckpointStore, ResumeError, RunLock};
use weather_archive_downloader::ReportType;

fn executor(
    dir: &TempDir,
    fetcher: Arc<ScriptedFetcher>,
    quota: Arc<FixedQuota>,
    workers: usize,
) -> RunExecutor {
    RunExecutor::new(
        config(dir.path(), workers),
        fetcher,
        quota,
        Arc::new(RoundBudget::new(5)),
    )
}

#[tokio::test]
async fn test_quota_admits_ten_of_twenty_five() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let all = tasks(25);

    let summary = executor(&dir, fetcher.clone(), FixedQuota::remaining(10), 4)
        .execute(RunSeed::Fresh(all.clone()))
        .await
        .unwrap();

    assert_eq!(summary.total, 25);
    assert_eq!(summary.admitted, 10);
    assert_eq!(summary.deferred, 15);
    assert_eq!(summary.downloaded, 10);
    assert!(summary.needs_resume());
    assert_eq!(fetcher.total_calls(), 10, "no request beyond the quota");

    let state = dir.path().join("state");
    let progress = std::fs::read_to_string(state.join("progress.txt")).unwrap();
    assert_eq!(progress, "10\n25\n");

    let checkpoint = CheckpointStore::new(&state).load().unwrap().unwrap();
    assert_eq!(checkpoint.deferred, all[10..].to_vec());

    for task in &all[..10] {
        assert!(dir.path().join("data").join(task.relative_path()).exists());
    }
    for task in &all[10..] {
        assert!(!dir.path().join("data").join(task.relative_path()).exists());
        assert_eq!(fetcher.calls_for(task), 0);
    }
}

#[tokio::test]
async fn test_sixty_day_range_downloads_two_windows() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let entry = CatalogEntry::new("725030-14732", ReportType::Hourly);
    let start = chrono::NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
    let end = chrono::NaiveDate::from_ymd_opt(2016, 3, 1).unwrap();
    let generated = generate_tasks(&entry, start, end).unwrap();
    assert_eq!(generated.len(), 2);

    let summary = executor(&dir, fetcher, FixedQuota::remaining(500), 8)
        .execute(RunSeed::Fresh(generated))
        .await
        .unwrap();
    assert_eq!(summary.downloaded, 2);

    let data = dir.path().join("data").join("hourly");
    assert!(data.join("2016-01-01_2016-01-31/725030-14732.json").exists());
    assert!(data.join("2016-02-01_2016-03-01/725030-14732.json").exists());
}

#[tokio::test]
async fn test_finished_run_clears_checkpoint() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());

    let summary = executor(&dir, fetcher, FixedQuota::remaining(100), 3)
        .execute(RunSeed::Fresh(tasks(7)))
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 7);
    assert_eq!(summary.deferred, 0);
    assert_eq!(summary.percentage(), 100.0);
    assert!(CheckpointStore::new(dir.path().join("state"))
        .load()
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_empty_results_are_counted_and_optionally_skipped() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().empty_for("S1"));
    let all = tasks(3);

    let mut run_config = config(dir.path(), 2);
    run_config.write_empty_payloads = false;
    let summary = RunExecutor::new(
        run_config,
        fetcher,
        FixedQuota::remaining(10),
        Arc::new(RoundBudget::new(5)),
    )
    .execute(RunSeed::Fresh(all.clone()))
    .await
    .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.empty, 1);
    assert_eq!(summary.abandoned, 0);
    assert!(!dir.path().join("data").join(all[1].relative_path()).exists());
}

#[tokio::test]
async fn test_exhausted_quota_stops_before_any_work() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());

    let err = executor(&dir, fetcher.clone(), FixedQuota::remaining(0), 2)
        .execute(RunSeed::Fresh(tasks(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Quota(QuotaError::Exhausted { .. })));
    assert_eq!(fetcher.total_calls(), 0);
    assert!(CheckpointStore::new(dir.path().join("state"))
        .load()
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unavailable_quota_is_fatal() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());

    let err = executor(&dir, fetcher.clone(), FixedQuota::unavailable(), 2)
        .execute(RunSeed::Fresh(tasks(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Quota(QuotaError::Unavailable(_))));
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn test_fresh_run_refuses_to_discard_deferred_work() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());

    executor(&dir, fetcher.clone(), FixedQuota::remaining(2), 2)
        .execute(RunSeed::Fresh(tasks(5)))
        .await
        .unwrap();

    let err = executor(&dir, fetcher.clone(), FixedQuota::remaining(2), 2)
        .execute(RunSeed::Fresh(tasks(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::CheckpointExists { deferred: 3, .. }));

    let mut overwrite = config(dir.path(), 2);
    overwrite.overwrite_checkpoint = true;
    let summary = RunExecutor::new(
        overwrite,
        fetcher,
        FixedQuota::remaining(100),
        Arc::new(RoundBudget::new(5)),
    )
    .execute(RunSeed::Fresh(tasks(5)))
    .await
    .unwrap();
    assert_eq!(summary.downloaded, 5);
    assert_eq!(summary.carried_over, 0);
}

#[tokio::test]
async fn test_second_run_on_same_state_dir_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");
    std::fs::create_dir_all(&state).unwrap();

    let mut held = RunLock::open(&state).unwrap();
    let _guard = held.try_hold().unwrap();

    let fetcher = Arc::new(ScriptedFetcher::new());
    let err = executor(&dir, fetcher.clone(), FixedQuota::remaining(10), 2)
        .execute(RunSeed::Fresh(tasks(3)))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Resume(ResumeError::Locked(_))));
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut bad = config(dir.path(), 2);
    bad.workers = 0;

    let err = RunExecutor::new(
        bad,
        Arc::new(ScriptedFetcher::new()),
        FixedQuota::remaining(10),
        Arc::new(RoundBudget::new(5)),
    )
    .execute(RunSeed::Fresh(tasks(3)))
    .await
    .unwrap_err();
    assert!(matches!(err, DownloadError::InvalidConfig(_)));
}
