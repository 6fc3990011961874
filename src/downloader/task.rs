//! Fetch task generation
//!
//! The provider answers at most [`MAX_WINDOW_DAYS`] days of history per request,
//! so every station is tiled into consecutive inclusive date windows. Generation
//! is pure and deterministic: resuming a run relies on regenerating exactly the
//! same task identities from the same inputs.

use crate::catalog::CatalogEntry;
use crate::downloader::config::MAX_WINDOW_DAYS;
use crate::ReportType;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File extension of persisted payloads
pub const PAYLOAD_EXTENSION: &str = "json";

/// Task generation and descriptor errors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Start date is after end date
    #[error("start date {start} is after end date {end}")]
    InvertedRange {
        /// Requested start date
        start: NaiveDate,
        /// Requested end date
        end: NaiveDate,
    },

    /// A serialized task could not be read back
    #[error("invalid task descriptor '{line}': {message}")]
    InvalidDescriptor {
        /// The offending line
        line: String,
        /// Parse error
        message: String,
    },

    /// A task could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// One bounded-span request for one station
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchTask {
    /// Provider station identifier
    pub station_id: String,
    /// Report frequency class
    pub report_type: ReportType,
    /// First day covered (inclusive)
    pub start_date: NaiveDate,
    /// Last day covered (inclusive)
    pub end_date: NaiveDate,
}

impl FetchTask {
    /// Create a task for an explicit window
    pub fn new(
        station_id: impl Into<String>,
        report_type: ReportType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            report_type,
            start_date,
            end_date,
        }
    }

    /// Number of days covered, both ends included
    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Directory name of the window, `{start}_{end}`
    pub fn window_label(&self) -> String {
        format!("{}_{}", self.start_date, self.end_date)
    }

    /// Path of the payload relative to the output root:
    /// `{report_type}/{start}_{end}/{station_id}.json`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.report_type.as_str())
            .join(self.window_label())
            .join(format!(
                "{}.{PAYLOAD_EXTENSION}",
                crate::output::sanitize_station_id(&self.station_id)
            ))
    }

    /// Serialize to a single line for the checkpoint and failure log
    pub fn to_descriptor(&self) -> Result<String, TaskError> {
        serde_json::to_string(self).map_err(|e| TaskError::SerializationError(e.to_string()))
    }

    /// Parse a line written by [`FetchTask::to_descriptor`]
    pub fn from_descriptor(line: &str) -> Result<Self, TaskError> {
        let task: FetchTask =
            serde_json::from_str(line.trim()).map_err(|e| TaskError::InvalidDescriptor {
                line: line.to_string(),
                message: e.to_string(),
            })?;

        if task.start_date > task.end_date {
            return Err(TaskError::InvalidDescriptor {
                line: line.to_string(),
                message: "start date is after end date".to_string(),
            });
        }
        Ok(task)
    }
}

impl std::fmt::Display for FetchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} [{}..{}]",
            self.report_type, self.station_id, self.start_date, self.end_date
        )
    }
}

/// Tile `[start, end]` into ascending windows of at most [`MAX_WINDOW_DAYS`] days
pub fn generate_tasks(
    entry: &CatalogEntry,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<FetchTask>, TaskError> {
    if start > end {
        return Err(TaskError::InvertedRange { start, end });
    }

    let total_days = (end - start).num_days() as u64 + 1;
    let mut tasks = Vec::with_capacity(total_days.div_ceil(MAX_WINDOW_DAYS) as usize);
    let mut window_start = start;

    loop {
        let window_end = window_start
            .checked_add_days(Days::new(MAX_WINDOW_DAYS - 1))
            .map_or(end, |d| d.min(end));

        tasks.push(FetchTask::new(
            entry.station_id.clone(),
            entry.report_type,
            window_start,
            window_end,
        ));

        match window_end.succ_opt() {
            Some(next) if window_end < end => window_start = next,
            _ => break,
        }
    }

    Ok(tasks)
}

/// Generate tasks for every entry, in entry order
pub fn generate_all(
    entries: &[CatalogEntry],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<FetchTask>, TaskError> {
    let mut tasks = Vec::new();
    for entry in entries {
        tasks.extend(generate_tasks(entry, start, end)?);
    }
    Ok(tasks)
}
