//! Run-wide counters shared by all workers.
//!
//! Owned by the executor and handed to workers behind an `Arc`. Counters are
//! atomics; the progress tracker sits behind its own mutex and is only touched
//! once per finished task.

use crate::downloader::progress::ProgressState;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Shared counters of one run
#[derive(Debug)]
pub struct RunState {
    total: u64,
    carried_over: u64,
    succeeded: AtomicU64,
    empty: AtomicU64,
    failed_attempts: AtomicU64,
    progress: Mutex<ProgressState>,
}

/// Point-in-time copy of [`RunState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    /// Total tasks of the whole job, including earlier runs
    pub total: u64,
    /// Completed tasks (carried over + succeeded + empty)
    pub completed: u64,
    /// Tasks written with a parseable payload in this run
    pub succeeded: u64,
    /// Tasks that returned an empty result in this run
    pub empty: u64,
    /// Failed fetch attempts in this run (a task may fail more than once)
    pub failed_attempts: u64,
}

impl RunState {
    /// Create counters for a job of `total` tasks, `carried_over` of which
    /// were completed by earlier runs.
    pub fn new(total: u64, carried_over: u64) -> Self {
        Self {
            total,
            carried_over,
            succeeded: AtomicU64::new(0),
            empty: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            progress: Mutex::new(ProgressState::new(total, carried_over)),
        }
    }

    /// Record a task persisted with a parseable payload
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.tick();
    }

    /// Record a task that completed with an empty result
    pub fn record_empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
        self.tick();
    }

    /// Record a failed fetch attempt
    pub fn record_failure(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> RunSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let empty = self.empty.load(Ordering::Relaxed);
        RunSnapshot {
            total: self.total,
            completed: self.carried_over + succeeded + empty,
            succeeded,
            empty,
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
        }
    }

    fn tick(&self) {
        // A poisoned tracker only loses progress lines
        let Ok(mut progress) = self.progress.lock() else {
            return;
        };
        progress.update(1);
        if progress.should_emit_update() {
            info!("{}", progress.format_progress());
            progress.mark_emitted();
        }
    }
}

impl RunSnapshot {
    /// Completion percentage of the whole job
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 * 100.0 / self.total as f64).min(100.0)
        }
    }
}
