//! Download orchestration
//!
//! This module is the engine of the crate: it turns a task list into files on
//! disk without exceeding the provider's quota, survives restarts, and retries
//! failures in bounded rounds.
//!
//! # Overview
//!
//! 1. **Task generation**: [`task::generate_all`] tiles each station's date
//!    range into windows of at most 31 days
//! 2. **Admission**: [`crate::quota`] cuts the list at the remaining call budget
//! 3. **Checkpoint**: the split is persisted through [`crate::resume`]
//! 4. **Execution**: [`pool::WorkerPool`] runs shards of the admitted tasks
//!    through a shared [`worker::FetchWorker`]
//! 5. **Retries**: failed tasks sit in the [`ledger::FailureLedger`] and are
//!    re-run in rounds while the [`retry::RetryPolicy`] allows
//! 6. **Failure log**: whatever still fails is appended to the durable log
//!
//! [`executor::RunExecutor`] drives the whole sequence.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use weather_archive_downloader::downloader::{RoundBudget, RunConfig, RunExecutor, RunSeed};
//! use weather_archive_downloader::fetcher::http::build_http_client;
//! use weather_archive_downloader::fetcher::WeatherbitClient;
//!
//! # async fn example(tasks: Vec<weather_archive_downloader::FetchTask>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::default();
//! let client = build_http_client(config.fetch_timeout)?;
//! let weatherbit = Arc::new(WeatherbitClient::new(client, "https://api.weatherbit.io/v2.0", "KEY")?);
//!
//! let executor = RunExecutor::new(config, weatherbit.clone(), weatherbit, Arc::new(RoundBudget::new(5)));
//! let summary = executor.execute(RunSeed::Fresh(tasks)).await?;
//! println!("{} downloaded, {} deferred", summary.downloaded, summary.deferred);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod ledger;
pub mod partition;
pub mod pool;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod state;
pub mod task;
pub mod worker;

pub use config::{RunConfig, UnparseablePolicy};
pub use executor::{RunExecutor, RunMode, RunSeed, RunSummary};
pub use ledger::{FailureLedger, FailureRecord, RetryStatus};
pub use pool::{PassFailure, PassReport, WorkerPool};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use retry::{ConfirmEvery, ConfirmPrompt, RetryDecision, RetryPolicy, RoundBudget};
pub use state::{RunSnapshot, RunState};
pub use task::{generate_all, generate_tasks, FetchTask, TaskError};
pub use worker::{FetchWorker, TaskOutcome};

use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::quota::QuotaError;
use crate::resume::ResumeError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Task generation or descriptor error
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Quota could not be read or is exhausted
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Checkpoint, failure log or lock error
    #[error("resume state error: {0}")]
    Resume(#[from] ResumeError),

    /// Payload could not be written
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Fetcher could not be set up
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// A fresh run would discard deferred work
    #[error(
        "checkpoint in {dir} still has {deferred} deferred tasks; run `resume` or pass --overwrite-checkpoint"
    )]
    CheckpointExists {
        /// State directory
        dir: String,
        /// Deferred task count
        deferred: usize,
    },

    /// There is no work for the requested mode
    #[error("nothing to do: {0}")]
    NothingToDo(String),

    /// Invalid run configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker task panicked
    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}
