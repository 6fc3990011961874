//! Quota guard
//!
//! Before any work starts the provider is asked how many history calls remain.
//! The task list is then cut in two: the prefix that fits the budget runs now,
//! the rest is deferred to the checkpoint for a later `resume`.
//!
//! There is no optimistic default. If the budget cannot be read the run stops,
//! and if the budget is zero the run stops with the reset time.

use crate::downloader::task::FetchTask;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Quota errors
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// The quota endpoint could not be queried or answered garbage
    #[error("quota unavailable: {0}; try again later")]
    Unavailable(String),

    /// No calls left in the current period
    #[error("API quota exhausted{}", reset_suffix(.reset_at))]
    Exhausted {
        /// When the provider resets the budget, if known
        reset_at: Option<DateTime<Utc>>,
    },
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(", resets at {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => String::new(),
    }
}

/// Remaining call budget reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    /// Calls left in the current period
    pub remaining: u64,
    /// When the budget resets
    pub reset_at: Option<DateTime<Utc>>,
}

impl QuotaStatus {
    /// Status with a known budget and no reset time
    pub fn new(remaining: u64) -> Self {
        Self {
            remaining,
            reset_at: None,
        }
    }
}

/// Reports the remaining call budget
#[async_trait]
pub trait QuotaSource: Send + Sync {
    /// Query the provider for the remaining call budget
    async fn remaining_calls(&self) -> Result<QuotaStatus, QuotaError>;
}

/// Result of [`split_by_quota`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaSplit {
    /// Tasks to run now
    pub admit: Vec<FetchTask>,
    /// Tasks left for a later run
    pub defer: Vec<FetchTask>,
}

/// Admit the first `min(len, remaining)` tasks and defer the rest, keeping
/// order in both halves.
pub fn split_by_quota(mut tasks: Vec<FetchTask>, remaining: u64) -> QuotaSplit {
    let admit_len = usize::try_from(remaining).map_or(tasks.len(), |r| r.min(tasks.len()));
    let defer = tasks.split_off(admit_len);
    QuotaSplit {
        admit: tasks,
        defer,
    }
}

/// Fail with [`QuotaError::Exhausted`] when no calls remain
pub fn ensure_available(status: &QuotaStatus) -> Result<(), QuotaError> {
    if status.remaining == 0 {
        warn!(reset_at = ?status.reset_at, "API quota exhausted");
        return Err(QuotaError::Exhausted {
            reset_at: status.reset_at,
        });
    }
    Ok(())
}

/// Query `source`, require a non-zero budget and split `tasks` against it
pub async fn admit_tasks(
    source: &dyn QuotaSource,
    tasks: Vec<FetchTask>,
) -> Result<(QuotaStatus, QuotaSplit), QuotaError> {
    let status = source.remaining_calls().await?;
    crate::metrics::record_quota_remaining(status.remaining);
    ensure_available(&status)?;

    let split = split_by_quota(tasks, status.remaining);
    info!(
        remaining_calls = status.remaining,
        admitted = split.admit.len(),
        deferred = split.defer.len(),
        "Quota checked"
    );
    Ok((status, split))
}
