//! Retry rounds, abandonment and the failure log

use crate::support::{config, tasks, FixedQuota, ScriptedFetcher};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use weather_archive_downloader::downloader::{
    ConfirmEvery, ConfirmPrompt, DownloadError, RetryPolicy, RoundBudget, RunExecutor, RunMode,
    RunSeed,
};
use weather_archive_downloader::resume::{CheckpointStore, FailureLog};

fn executor(
    dir: &TempDir,
    fetcher: Arc<ScriptedFetcher>,
    remaining: u64,
    policy: Arc<dyn RetryPolicy>,
) -> RunExecutor {
    RunExecutor::new(
        config(dir.path(), 3),
        fetcher,
        FixedQuota::remaining(remaining),
        policy,
    )
}

fn failure_log(dir: &TempDir) -> FailureLog {
    FailureLog::in_dir(dir.path().join("state"))
}

struct Refuse {
    asked: AtomicU32,
}

#[async_trait]
impl ConfirmPrompt for Refuse {
    async fn confirm(&self, _rounds_completed: u32, _pending: usize) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        false
    }
}

#[tokio::test]
async fn test_fail_three_times_then_succeed_resolves() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().failing_first("S2", 3));
    let all = tasks(5);

    let summary = executor(&dir, fetcher.clone(), 100, Arc::new(RoundBudget::new(5)))
        .execute(RunSeed::Fresh(all.clone()))
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 5);
    assert_eq!(summary.failed_attempts, 3);
    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.abandoned, 0);
    assert_eq!(summary.retry_rounds, 3);
    assert_eq!(fetcher.calls_for(&all[2]), 4);
    assert!(failure_log(&dir).is_empty().unwrap());
    assert!(dir.path().join("data").join(all[2].relative_path()).exists());
}

#[tokio::test]
async fn test_unattended_cap_abandons_each_task_once() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .always_failing("S1")
            .always_failing("S3"),
    );
    let all = tasks(6);

    let summary = executor(&dir, fetcher.clone(), 100, Arc::new(RoundBudget::new(5)))
        .execute(RunSeed::Fresh(all.clone()))
        .await
        .unwrap();

    assert_eq!(summary.retry_rounds, 5);
    assert_eq!(summary.abandoned, 2);
    assert_eq!(summary.downloaded, 4);
    assert_eq!(fetcher.calls_for(&all[1]), 6, "first pass plus five rounds");
    assert_eq!(fetcher.calls_for(&all[3]), 6);
    assert_eq!(fetcher.calls_for(&all[0]), 1);

    let logged = failure_log(&dir).read().unwrap();
    assert_eq!(logged.len(), 2);
    assert!(logged.contains(&all[1]));
    assert!(logged.contains(&all[3]));
    assert!(!dir.path().join("data").join(all[1].relative_path()).exists());
}

#[tokio::test]
async fn test_operator_can_stop_retrying() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().always_failing("S0"));
    let prompt = Arc::new(Refuse {
        asked: AtomicU32::new(0),
    });
    let policy = Arc::new(ConfirmEvery::new(2, prompt.clone()));

    let summary = executor(&dir, fetcher.clone(), 100, policy)
        .execute(RunSeed::Fresh(tasks(2)))
        .await
        .unwrap();

    assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
    assert_eq!(summary.retry_rounds, 2);
    assert_eq!(summary.abandoned, 1);
    assert_eq!(fetcher.calls_for(&tasks(2)[0]), 3);
    assert_eq!(failure_log(&dir).len().unwrap(), 1);
}

#[tokio::test]
async fn test_run_appends_to_existing_failure_log() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().always_failing("S0"));

    for _ in 0..2 {
        executor(&dir, fetcher.clone(), 100, Arc::new(RoundBudget::new(1)))
            .execute(RunSeed::Fresh(tasks(2)))
            .await
            .unwrap();
    }

    let log = failure_log(&dir);
    assert_eq!(log.len().unwrap(), 2);
    assert_eq!(log.read_unique().unwrap(), vec![tasks(1)[0].clone()]);
}

#[tokio::test]
async fn test_retry_failed_rewrites_log_with_unresolved_tasks() {
    let dir = TempDir::new().unwrap();
    let all = tasks(3);
    let log = failure_log(&dir);
    log.append(&[all[0].clone(), all[1].clone(), all[2].clone(), all[0].clone()])
        .unwrap();

    let fetcher = Arc::new(ScriptedFetcher::new().always_failing("S2"));
    let summary = executor(&dir, fetcher.clone(), 100, Arc::new(RoundBudget::new(2)))
        .execute(RunSeed::FailureLog)
        .await
        .unwrap();

    assert_eq!(summary.mode, RunMode::RetryFailed);
    assert_eq!(summary.total, 3, "duplicates are fetched once");
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.abandoned, 1);
    assert!(!summary.needs_resume());
    assert_eq!(fetcher.calls_for(&all[0]), 1);

    assert_eq!(log.read().unwrap(), vec![all[2].clone()]);
    assert!(CheckpointStore::new(dir.path().join("state"))
        .load()
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_retry_failed_keeps_quota_deferred_tasks_in_log() {
    let dir = TempDir::new().unwrap();
    let all = tasks(3);
    let log = failure_log(&dir);
    log.append(&all).unwrap();

    let fetcher = Arc::new(ScriptedFetcher::new());
    let summary = executor(&dir, fetcher, 1, Arc::new(RoundBudget::new(2)))
        .execute(RunSeed::FailureLog)
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.deferred, 2);
    assert_eq!(log.read().unwrap(), all[1..].to_vec());
}

#[tokio::test]
async fn test_retry_failed_with_empty_log_has_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    let err = executor(
        &dir,
        Arc::new(ScriptedFetcher::new()),
        10,
        Arc::new(RoundBudget::new(2)),
    )
    .execute(RunSeed::FailureLog)
    .await
    .unwrap_err();
    assert!(matches!(err, DownloadError::NothingToDo(_)));
}

#[tokio::test]
async fn test_resolved_retry_failed_clears_log() {
    let dir = TempDir::new().unwrap();
    let log = failure_log(&dir);
    log.append(&tasks(2)).unwrap();

    executor(
        &dir,
        Arc::new(ScriptedFetcher::new()),
        10,
        Arc::new(RoundBudget::new(2)),
    )
    .execute(RunSeed::FailureLog)
    .await
    .unwrap();

    assert!(log.is_empty().unwrap());
}
