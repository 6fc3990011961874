//! Resuming deferred and interrupted work

use crate::support::{config, tasks, FixedQuota, ScriptedFetcher};
use std::sync::Arc;
use tempfile::TempDir;
use weather_archive_downloader::downloader::{
    DownloadError, RoundBudget, RunExecutor, RunMode, RunSeed,
};
use weather_archive_downloader::output::OutputLayout;
use weather_archive_downloader::resume::{CheckpointStore, FailureLog};
use weather_archive_downloader::shutdown::ShutdownCoordinator;

fn executor(dir: &TempDir, fetcher: Arc<ScriptedFetcher>, remaining: u64, workers: usize) -> RunExecutor {
    RunExecutor::new(
        config(dir.path(), workers),
        fetcher,
        FixedQuota::remaining(remaining),
        Arc::new(RoundBudget::new(5)),
    )
}

#[tokio::test]
async fn test_resume_carries_counts_forward() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let all = tasks(25);

    executor(&dir, fetcher.clone(), 10, 4)
        .execute(RunSeed::Fresh(all.clone()))
        .await
        .unwrap();

    let summary = executor(&dir, fetcher.clone(), 100, 4)
        .execute(RunSeed::Resume)
        .await
        .unwrap();

    assert_eq!(summary.mode, RunMode::Resume);
    assert_eq!(summary.total, 25);
    assert_eq!(summary.carried_over, 10);
    assert_eq!(summary.admitted, 15);
    assert_eq!(summary.downloaded, 15);
    assert_eq!(summary.deferred, 0);
    assert_eq!(summary.percentage(), 100.0);

    for task in &all {
        assert_eq!(fetcher.calls_for(task), 1, "{task} fetched more than once");
        assert!(dir.path().join("data").join(task.relative_path()).exists());
    }
    assert!(CheckpointStore::new(dir.path().join("state"))
        .load()
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_resume_can_defer_again() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());

    executor(&dir, fetcher.clone(), 10, 2)
        .execute(RunSeed::Fresh(tasks(25)))
        .await
        .unwrap();
    let summary = executor(&dir, fetcher, 5, 2)
        .execute(RunSeed::Resume)
        .await
        .unwrap();

    assert_eq!(summary.carried_over, 10);
    assert_eq!(summary.deferred, 10);

    let checkpoint = CheckpointStore::new(dir.path().join("state"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.completed, 15);
    assert_eq!(checkpoint.total, 25);
    assert_eq!(checkpoint.deferred, tasks(25)[15..].to_vec());
}

#[tokio::test]
async fn test_resume_without_checkpoint_has_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    let err = executor(&dir, Arc::new(ScriptedFetcher::new()), 10, 2)
        .execute(RunSeed::Resume)
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::NothingToDo(_)));
}

#[tokio::test]
async fn test_shutdown_checkpoints_unstarted_tasks() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let fetcher = Arc::new(ScriptedFetcher::new().shutting_down_after(2, shutdown.clone()));
    let all = tasks(6);

    let summary = executor(&dir, fetcher.clone(), 100, 1)
        .with_shutdown(shutdown)
        .execute(RunSeed::Fresh(all.clone()))
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.interrupted, 4);
    assert_eq!(summary.deferred, 4);
    assert!(summary.needs_resume());

    let checkpoint = CheckpointStore::new(dir.path().join("state"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.completed, 2);
    assert_eq!(checkpoint.total, 6);
    assert_eq!(checkpoint.deferred, all[2..].to_vec());

    let resumed = executor(&dir, fetcher.clone(), 100, 1)
        .with_shutdown(ShutdownCoordinator::shared())
        .execute(RunSeed::Resume)
        .await
        .unwrap();
    assert_eq!(resumed.carried_over, 2);
    assert_eq!(resumed.downloaded, 4);
    assert_eq!(fetcher.total_calls(), 6);
}

#[tokio::test]
async fn test_fatal_write_error_keeps_admitted_work_resumable() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let all = tasks(6);
    // A regular file where the output root should be
    let data = dir.path().join("data");
    std::fs::write(&data, b"not a directory").unwrap();

    let result = executor(&dir, fetcher.clone(), 100, 1)
        .execute(RunSeed::Fresh(all.clone()))
        .await;
    assert!(matches!(result, Err(DownloadError::Output(_))));
    assert_eq!(fetcher.total_calls(), 1);

    let checkpoint = CheckpointStore::new(dir.path().join("state"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.completed, 0);
    assert_eq!(checkpoint.total, 6);
    assert_eq!(checkpoint.deferred, all);
    assert!(FailureLog::in_dir(dir.path().join("state"))
        .is_empty()
        .unwrap());

    std::fs::remove_file(&data).unwrap();
    let summary = executor(&dir, fetcher.clone(), 100, 1)
        .execute(RunSeed::Resume)
        .await
        .unwrap();
    assert_eq!(summary.admitted, 6);
    assert_eq!(summary.downloaded, 6);
    for task in &all {
        assert!(data.join(task.relative_path()).exists());
    }
}

#[tokio::test]
async fn test_fatal_write_error_logs_pending_failures() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().always_failing("S0"));
    let all = tasks(3);
    // Only the second task's window directory is unusable
    let blocked = OutputLayout::new(dir.path().join("data")).window_dir(&all[1]);
    std::fs::create_dir_all(blocked.parent().unwrap()).unwrap();
    std::fs::write(&blocked, b"x").unwrap();

    let result = executor(&dir, fetcher, 100, 1)
        .execute(RunSeed::Fresh(all.clone()))
        .await;
    assert!(matches!(result, Err(DownloadError::Output(_))));

    let state = dir.path().join("state");
    assert_eq!(FailureLog::in_dir(&state).read().unwrap(), vec![all[0].clone()]);

    let checkpoint = CheckpointStore::new(&state).load().unwrap().unwrap();
    // The logged failure counts as handled; the rest is left for resume
    assert_eq!(checkpoint.completed, 1);
    assert_eq!(checkpoint.deferred, all[1..].to_vec());
}
