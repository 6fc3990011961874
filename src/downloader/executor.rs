//! Run executor
//!
//! Drives one run from task list to summary: take the run lock, check the
//! quota, write the checkpoint, run the pool, retry failures in rounds, record
//! what is left.

use crate::downloader::config::{calculate_backoff, RunConfig};
use crate::downloader::ledger::{FailureLedger, RetryStatus};
use crate::downloader::pool::WorkerPool;
use crate::downloader::progress::format_duration;
use crate::downloader::retry::{RetryDecision, RetryPolicy};
use crate::downloader::state::RunState;
use crate::downloader::task::FetchTask;
use crate::downloader::worker::FetchWorker;
use crate::downloader::DownloadError;
use crate::fetcher::ArchiveFetcher;
use crate::metrics::record_retry_round;
use crate::output::{OutputLayout, PayloadWriter};
use crate::quota::{admit_tasks, QuotaSource};
use crate::resume::{Checkpoint, CheckpointStore, FailureLog, RunLock};
use crate::shutdown::{self, SharedShutdown};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

/// How a run obtains its task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Fresh task list from the catalog
    Run,
    /// Deferred tasks of the checkpoint
    Resume,
    /// Tasks of the failure log
    RetryFailed,
}

impl RunMode {
    /// Command name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Run => "run",
            RunMode::Resume => "resume",
            RunMode::RetryFailed => "retry-failed",
        }
    }
}

/// Where the tasks of a run come from
#[derive(Debug, Clone)]
pub enum RunSeed {
    /// Generated tasks of a new job
    Fresh(Vec<FetchTask>),
    /// Continue the job recorded in the checkpoint
    Resume,
    /// Re-run the tasks of the failure log
    FailureLog,
}

impl RunSeed {
    /// Mode of this seed
    pub fn mode(&self) -> RunMode {
        match self {
            RunSeed::Fresh(_) => RunMode::Run,
            RunSeed::Resume => RunMode::Resume,
            RunSeed::FailureLog => RunMode::RetryFailed,
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Run mode
    pub mode: RunMode,
    /// Tasks in the whole job
    pub total: u64,
    /// Tasks handled by earlier runs
    pub carried_over: u64,
    /// Tasks admitted by the quota in this run
    pub admitted: usize,
    /// Tasks left for a later run (quota deferral plus interrupted tasks)
    pub deferred: usize,
    /// Tasks written with a payload
    pub downloaded: u64,
    /// Tasks with an empty result
    pub empty: u64,
    /// Failed attempts, retries included
    pub failed_attempts: u64,
    /// Tasks that failed at least once and later succeeded
    pub resolved: usize,
    /// Tasks given up on and written to the failure log
    pub abandoned: usize,
    /// Retry rounds run
    pub retry_rounds: u32,
    /// Admitted tasks never started because of shutdown
    pub interrupted: usize,
    /// Remaining calls reported before the run
    pub quota_remaining: u64,
    /// When the provider resets the budget
    pub quota_reset_at: Option<DateTime<Utc>>,
    /// Wall time of the run in seconds
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// Job-wide completion percentage after this run
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        let done = self.carried_over + self.downloaded + self.empty;
        (done as f64 * 100.0 / self.total as f64).min(100.0)
    }

    /// Whether a later `resume` has work to do
    pub fn needs_resume(&self) -> bool {
        self.mode != RunMode::RetryFailed && self.deferred > 0
    }
}

/// Orchestrates one run
pub struct RunExecutor {
    config: RunConfig,
    fetcher: Arc<dyn ArchiveFetcher>,
    quota: Arc<dyn QuotaSource>,
    policy: Arc<dyn RetryPolicy>,
    shutdown: Option<SharedShutdown>,
    show_progress: bool,
}

impl RunExecutor {
    /// Create an executor
    pub fn new(
        config: RunConfig,
        fetcher: Arc<dyn ArchiveFetcher>,
        quota: Arc<dyn QuotaSource>,
        policy: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            config,
            fetcher,
            quota,
            policy,
            shutdown: shutdown::get_global_shutdown(),
            show_progress: false,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Draw an indicatif progress bar for each pool pass
    pub fn with_progress_bar(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute a run
    pub async fn execute(&self, seed: RunSeed) -> Result<RunSummary, DownloadError> {
        let mode = seed.mode();
        let span = tracing::info_span!("run", mode = mode.as_str());
        self.execute_inner(seed).instrument(span).await
    }

    async fn execute_inner(&self, seed: RunSeed) -> Result<RunSummary, DownloadError> {
        self.config
            .validate()
            .map_err(DownloadError::InvalidConfig)?;

        let started = Instant::now();
        let mode = seed.mode();
        let state_dir = self.config.state_dir.clone();

        let mut run_lock = RunLock::open(&state_dir)?;
        let _run_guard = run_lock.try_hold()?;

        let store = CheckpointStore::new(&state_dir);
        let failure_log = FailureLog::in_dir(&state_dir);

        let (tasks, total, carried_over) = self.load_tasks(seed, &store, &failure_log)?;
        info!(
            tasks = tasks.len(),
            total,
            carried_over,
            "Task list ready"
        );

        let (quota, split) = admit_tasks(self.quota.as_ref(), tasks).await?;
        let admitted = split.admit.len();
        let deferred = split.defer;

        let records = RunRecords {
            mode,
            store,
            failure_log,
            carried_over,
            admitted,
            total,
        };
        if mode != RunMode::RetryFailed {
            let checkpoint =
                Checkpoint::new(carried_over + admitted as u64, total, deferred.clone());
            records.store.save(&checkpoint)?;
        }
        if !deferred.is_empty() {
            info!(
                deferred = deferred.len(),
                "Quota does not cover every task; the rest is deferred"
            );
        }

        let state = Arc::new(RunState::new(total, carried_over));
        let ledger = Arc::new(FailureLedger::new());
        let worker = FetchWorker::new(
            Arc::clone(&self.fetcher),
            PayloadWriter::new(OutputLayout::new(&self.config.output_dir)),
            Arc::clone(&state),
            Arc::clone(&ledger),
            self.config.fetch_timeout,
        )
        .with_empty_payloads(self.config.write_empty_payloads);

        let progress_bar = self.show_progress.then(create_progress_bar);
        let mut pool = WorkerPool::new(Arc::new(worker), self.config.workers);
        if let Some(shutdown) = &self.shutdown {
            pool = pool.with_shutdown(Arc::clone(shutdown));
        }
        if let Some(pb) = &progress_bar {
            pool = pool.with_progress_bar(pb.clone());
            pb.set_message("Downloading");
        }

        let first_pass = match pool.run(split.admit).await {
            Ok(report) => report,
            Err(failure) => {
                clear_progress(progress_bar.as_ref());
                return Err(records.salvage(
                    &ledger,
                    &failure.unfinished,
                    &deferred,
                    failure.error,
                ));
            }
        };
        let interrupted = first_pass.unstarted;

        let retry_rounds = if interrupted.is_empty() {
            match self
                .retry_failures(&pool, &ledger, progress_bar.as_ref())
                .await
            {
                Ok(rounds) => rounds,
                Err(e) => {
                    clear_progress(progress_bar.as_ref());
                    return Err(records.salvage(&ledger, &[], &deferred, e));
                }
            }
        } else {
            0
        };

        clear_progress(progress_bar.as_ref());

        let abandoned = ledger.abandon_pending();
        for record in ledger
            .records()
            .iter()
            .filter(|r| r.status == RetryStatus::Abandoned)
        {
            warn!(
                task = %record.task,
                attempts = record.attempts,
                last_error = %record.last_error,
                "Task abandoned"
            );
        }

        let left_over = records.persist(&abandoned, &interrupted, &deferred)?;
        let interrupted_count = interrupted.len();

        let snapshot = state.snapshot();
        let summary = RunSummary {
            mode,
            total,
            carried_over,
            admitted,
            deferred: left_over.len(),
            downloaded: snapshot.succeeded,
            empty: snapshot.empty,
            failed_attempts: snapshot.failed_attempts,
            resolved: ledger.count(RetryStatus::Resolved),
            abandoned: abandoned.len(),
            retry_rounds,
            interrupted: interrupted_count,
            quota_remaining: quota.remaining,
            quota_reset_at: quota.reset_at,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            downloaded = summary.downloaded,
            empty = summary.empty,
            abandoned = summary.abandoned,
            deferred = summary.deferred,
            retry_rounds = summary.retry_rounds,
            elapsed = %format_duration(started.elapsed()),
            "Run finished"
        );
        Ok(summary)
    }

    fn load_tasks(
        &self,
        seed: RunSeed,
        store: &CheckpointStore,
        failure_log: &FailureLog,
    ) -> Result<(Vec<FetchTask>, u64, u64), DownloadError> {
        match seed {
            RunSeed::Fresh(tasks) => {
                if let Some(existing) = store.load()? {
                    if !existing.is_finished() && !self.config.overwrite_checkpoint {
                        return Err(DownloadError::CheckpointExists {
                            dir: store.dir().display().to_string(),
                            deferred: existing.deferred.len(),
                        });
                    }
                    warn!(
                        deferred = existing.deferred.len(),
                        "Replacing existing checkpoint"
                    );
                }
                if tasks.is_empty() {
                    return Err(DownloadError::NothingToDo(
                        "no tasks were generated for the selected stations".to_string(),
                    ));
                }
                let total = tasks.len() as u64;
                Ok((tasks, total, 0))
            }
            RunSeed::Resume => {
                let checkpoint = store.load()?.ok_or_else(|| {
                    DownloadError::NothingToDo(format!(
                        "no checkpoint in {}",
                        store.dir().display()
                    ))
                })?;
                if checkpoint.is_finished() {
                    return Err(DownloadError::NothingToDo(
                        "the checkpoint has no deferred tasks".to_string(),
                    ));
                }
                info!(
                    completed = checkpoint.completed,
                    total = checkpoint.total,
                    deferred = checkpoint.deferred.len(),
                    "Resuming from checkpoint"
                );
                Ok((checkpoint.deferred, checkpoint.total, checkpoint.completed))
            }
            RunSeed::FailureLog => {
                let tasks = failure_log.read_unique()?;
                if tasks.is_empty() {
                    return Err(DownloadError::NothingToDo(format!(
                        "failure log {} is empty",
                        failure_log.path().display()
                    )));
                }
                let total = tasks.len() as u64;
                Ok((tasks, total, 0))
            }
        }
    }

    /// Re-run pending failures until none are left or the policy stops.
    /// Returns the number of rounds run.
    async fn retry_failures(
        &self,
        pool: &WorkerPool,
        ledger: &FailureLedger,
        progress_bar: Option<&ProgressBar>,
    ) -> Result<u32, DownloadError> {
        let mut rounds = 0u32;

        loop {
            if self.shutdown_requested() {
                break;
            }
            let pending = ledger.pending_count();
            if pending == 0 {
                break;
            }
            if decide_with_bar_hidden(self.policy.as_ref(), progress_bar, rounds, pending).await
                == RetryDecision::Stop
            {
                break;
            }

            let backoff = calculate_backoff(self.config.retry_delay, rounds);
            record_retry_round(rounds + 1, backoff, pending);
            info!(
                round = rounds + 1,
                pending,
                backoff_ms = backoff.as_millis(),
                "Starting retry round"
            );
            if let Some(shutdown) = &self.shutdown {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown.wait_for_shutdown() => break,
                }
            } else {
                tokio::time::sleep(backoff).await;
            }

            rounds += 1;
            if let Some(pb) = progress_bar {
                pb.set_message(format!("Retry round {rounds}"));
            }
            let batch = ledger.begin_round();
            let report = match pool.run(batch).await {
                Ok(report) => report,
                Err(failure) => {
                    ledger.requeue(&failure.unfinished);
                    return Err(failure.error);
                }
            };
            if !report.unstarted.is_empty() {
                ledger.requeue(&report.unstarted);
                break;
            }
        }

        Ok(rounds)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Where a run records the work it leaves behind
struct RunRecords {
    mode: RunMode,
    store: CheckpointStore,
    failure_log: FailureLog,
    carried_over: u64,
    admitted: usize,
    total: u64,
}

impl RunRecords {
    /// Persist the end state of the run and return the tasks left for later.
    ///
    /// `unfinished` are admitted tasks that never completed; they lead the
    /// left-over list ahead of the quota-deferred tasks. In checkpointed
    /// modes abandoned tasks count as completed since the failure log holds
    /// them.
    fn persist(
        &self,
        abandoned: &[FetchTask],
        unfinished: &[FetchTask],
        deferred: &[FetchTask],
    ) -> Result<Vec<FetchTask>, DownloadError> {
        let mut left_over = unfinished.to_vec();
        left_over.extend_from_slice(deferred);

        match self.mode {
            RunMode::Run | RunMode::Resume => {
                self.failure_log.append(abandoned)?;
                if left_over.is_empty() {
                    self.store.clear()?;
                } else if !unfinished.is_empty() {
                    let completed = self.carried_over
                        + self.admitted.saturating_sub(unfinished.len()) as u64;
                    self.store
                        .save(&Checkpoint::new(completed, self.total, left_over.clone()))?;
                }
            }
            RunMode::RetryFailed => {
                let mut residual = abandoned.to_vec();
                residual.extend(left_over.iter().cloned());
                self.failure_log.replace(&residual)?;
                if residual.is_empty() {
                    info!("Every logged failure is resolved; failure log cleared");
                }
            }
        }
        Ok(left_over)
    }

    /// Record what is known to be unfinished after an unrecoverable error,
    /// then hand the error back.
    fn salvage(
        &self,
        ledger: &FailureLedger,
        unfinished: &[FetchTask],
        deferred: &[FetchTask],
        error: DownloadError,
    ) -> DownloadError {
        let abandoned = ledger.abandon_pending();
        warn!(
            unfinished = unfinished.len(),
            abandoned = abandoned.len(),
            error = %error,
            "Run stopped by an unrecoverable error; recording unfinished work"
        );
        if let Err(e) = self.persist(&abandoned, unfinished, deferred) {
            error!(error = %e, "Could not record unfinished work");
        }
        error
    }
}

/// Ask the policy with the progress bar cleared from the terminal, so an
/// interactive prompt is not drawn over. The bar is restarted when the run
/// continues.
async fn decide_with_bar_hidden(
    policy: &dyn RetryPolicy,
    progress_bar: Option<&ProgressBar>,
    rounds: u32,
    pending: usize,
) -> RetryDecision {
    clear_progress(progress_bar);
    let decision = policy.decide(rounds, pending).await;
    if decision == RetryDecision::Continue {
        if let Some(pb) = progress_bar {
            pb.reset();
        }
    }
    decision
}

fn clear_progress(progress_bar: Option<&ProgressBar>) {
    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }
}

/// Progress bar shared by all pool passes of a run
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
