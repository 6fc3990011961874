//! In-memory failure ledger
//!
//! Every failed fetch attempt is recorded here. A task appears at most once;
//! repeated failures bump its attempt count. The retry loop moves records from
//! `Pending` to `Retrying` at the start of each round, a later success marks
//! them `Resolved`, and whatever is still pending when retries stop becomes
//! `Abandoned`.

use crate::downloader::task::FetchTask;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Lifecycle of a failed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStatus {
    /// Failed and waiting for the next retry round
    Pending,
    /// Handed to the current retry round
    Retrying,
    /// A retry succeeded
    Resolved,
    /// Retries stopped while the task was still failing
    Abandoned,
}

/// One failed task and its history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// The failing task
    pub task: FetchTask,
    /// Number of failed attempts
    pub attempts: u32,
    /// Current state
    pub status: RetryStatus,
    /// Message of the most recent failure
    pub last_error: String,
}

#[derive(Debug, Default)]
struct LedgerInner {
    records: Vec<FailureRecord>,
    index: HashMap<FetchTask, usize>,
}

/// Thread-safe ledger shared by workers and the retry loop
#[derive(Debug, Default)]
pub struct FailureLedger {
    inner: Mutex<LedgerInner>,
}

impl FailureLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt. A known task goes back to `Pending`.
    pub fn record_failure(&self, task: &FetchTask, error: impl Into<String>) {
        let error = error.into();
        let mut inner = self.lock();
        if let Some(&idx) = inner.index.get(task) {
            let record = &mut inner.records[idx];
            record.attempts = record.attempts.saturating_add(1);
            record.status = RetryStatus::Pending;
            record.last_error = error;
            return;
        }

        let idx = inner.records.len();
        inner.records.push(FailureRecord {
            task: task.clone(),
            attempts: 1,
            status: RetryStatus::Pending,
            last_error: error,
        });
        inner.index.insert(task.clone(), idx);
    }

    /// Mark a previously failed task as resolved. Unknown tasks are ignored.
    pub fn record_success(&self, task: &FetchTask) {
        let mut inner = self.lock();
        if let Some(&idx) = inner.index.get(task) {
            inner.records[idx].status = RetryStatus::Resolved;
        }
    }

    /// Move every pending record to `Retrying` and return their tasks in
    /// first-failure order.
    pub fn begin_round(&self) -> Vec<FetchTask> {
        let mut inner = self.lock();
        inner
            .records
            .iter_mut()
            .filter(|r| r.status == RetryStatus::Pending)
            .map(|r| {
                r.status = RetryStatus::Retrying;
                r.task.clone()
            })
            .collect()
    }

    /// Put tasks of an interrupted round back to `Pending`
    pub fn requeue(&self, tasks: &[FetchTask]) {
        let mut inner = self.lock();
        for task in tasks {
            if let Some(&idx) = inner.index.get(task) {
                if inner.records[idx].status == RetryStatus::Retrying {
                    inner.records[idx].status = RetryStatus::Pending;
                }
            }
        }
    }

    /// Number of records waiting for a retry
    pub fn pending_count(&self) -> usize {
        self.lock()
            .records
            .iter()
            .filter(|r| r.status == RetryStatus::Pending)
            .count()
    }

    /// Abandon every pending record and return the abandoned tasks
    pub fn abandon_pending(&self) -> Vec<FetchTask> {
        let mut inner = self.lock();
        inner
            .records
            .iter_mut()
            .filter(|r| r.status == RetryStatus::Pending)
            .map(|r| {
                r.status = RetryStatus::Abandoned;
                r.task.clone()
            })
            .collect()
    }

    /// Copy of all records
    pub fn records(&self) -> Vec<FailureRecord> {
        self.lock().records.clone()
    }

    /// Number of tasks that ever failed
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether no task has failed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records with the given status
    pub fn count(&self, status: RetryStatus) -> usize {
        self.lock()
            .records
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        // Records stay consistent even if a holder panicked mid-update
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
