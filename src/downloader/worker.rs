//! Fetch-and-persist worker
//!
//! Handles one task at a time: wait for a pacing slot, fetch under a timeout,
//! classify, write, and report to the shared counters and the failure ledger. Only filesystem
//! errors escape as `Err`; every provider problem becomes a ledger entry.

use crate::downloader::ledger::FailureLedger;
use crate::downloader::state::RunState;
use crate::downloader::task::FetchTask;
use crate::fetcher::{ArchiveFetcher, FailureReason, FetchOutcome};
use crate::metrics::{record_task_outcome, TaskOutcomeLabel};
use crate::output::{OutputError, PayloadWriter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What happened to one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Payload written
    Downloaded,
    /// Empty result, counted as complete
    Empty,
    /// Failed, recorded in the ledger
    Failed,
}

/// Shared per-run worker
pub struct FetchWorker {
    fetcher: Arc<dyn ArchiveFetcher>,
    writer: PayloadWriter,
    state: Arc<RunState>,
    ledger: Arc<FailureLedger>,
    fetch_timeout: Duration,
    write_empty_payloads: bool,
}

impl FetchWorker {
    /// Create a worker
    pub fn new(
        fetcher: Arc<dyn ArchiveFetcher>,
        writer: PayloadWriter,
        state: Arc<RunState>,
        ledger: Arc<FailureLedger>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            writer,
            state,
            ledger,
            fetch_timeout,
            write_empty_payloads: true,
        }
    }

    /// Whether empty results are written to disk
    pub fn with_empty_payloads(mut self, write_empty_payloads: bool) -> Self {
        self.write_empty_payloads = write_empty_payloads;
        self
    }

    /// Fetch and persist `task`
    pub async fn process(&self, task: &FetchTask) -> Result<TaskOutcome, OutputError> {
        let paced = self.fetcher.ready().await;
        let started = Instant::now();
        let outcome = match paced {
            Err(reason) => FetchOutcome::Failed(reason),
            Ok(()) => {
                match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(task)).await {
                    Ok(outcome) => outcome,
                    Err(_) => FetchOutcome::Failed(FailureReason::timeout(self.fetch_timeout)),
                }
            }
        };

        match outcome {
            FetchOutcome::Payload(body) => {
                self.writer.write(task, &body)?;
                self.state.record_success();
                self.ledger.record_success(task);
                record_task_outcome(TaskOutcomeLabel::Downloaded, started.elapsed());
                debug!(task = %task, bytes = body.len(), "Task downloaded");
                Ok(TaskOutcome::Downloaded)
            }
            FetchOutcome::Empty(body) => {
                if self.write_empty_payloads {
                    self.writer.write(task, &body)?;
                }
                self.state.record_empty();
                self.ledger.record_success(task);
                record_task_outcome(TaskOutcomeLabel::Empty, started.elapsed());
                debug!(task = %task, "Task returned no records");
                Ok(TaskOutcome::Empty)
            }
            FetchOutcome::Failed(reason) => {
                self.state.record_failure();
                self.ledger.record_failure(task, reason.to_string());
                record_task_outcome(
                    TaskOutcomeLabel::Failed(reason.kind.label()),
                    started.elapsed(),
                );
                warn!(task = %task, reason = %reason, "Task failed");
                Ok(TaskOutcome::Failed)
            }
        }
    }
}
