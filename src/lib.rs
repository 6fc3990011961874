//! # Weather Archive Downloader Library
//!
//! Bulk acquisition of historical weather station records from a rate-limited
//! archive provider. Every station in a catalog is expanded into bounded date
//! windows, the windows are admitted against the provider's call quota, and the
//! admitted work is fetched by a pool of concurrent workers that persist each
//! response under `{output}/{report_type}/{start}_{end}/{station}.json`.
//!
//! ## Features
//!
//! - **Quota Admission**: never issues more requests than the provider allows;
//!   the surplus is checkpointed for a later run
//! - **Resume Capability**: checkpoint written before work starts, so an
//!   interrupted or quota-limited run continues where it left off
//! - **Retry Rounds**: failed fetches are retried in rounds with an injected
//!   continue/stop policy, unresolved ones land in a durable failure log
//! - **Idempotent Output**: re-running a task rewrites the same file atomically
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use weather_archive_downloader::catalog::CatalogEntry;
//! use weather_archive_downloader::downloader::task::generate_tasks;
//! use weather_archive_downloader::ReportType;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let entry = CatalogEntry::new("725030-14732", ReportType::Daily);
//! let tasks = generate_tasks(
//!     &entry,
//!     NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2016, 3, 1).unwrap(),
//! )?;
//! assert_eq!(tasks.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`catalog`] - Station catalog reading and selection
//! - [`downloader`] - Task generation, worker pool, failure ledger and the run executor
//! - [`quota`] - Provider call budget and admit/defer split
//! - [`resume`] - Checkpoint store, failure log and run lock
//! - [`fetcher`] - Archive provider adapters
//! - [`output`] - Target path layout and payload writer
//! - [`cli`] - Command line interface

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Station catalog ingestion
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Download orchestration
pub mod downloader;

/// Archive provider adapters
pub mod fetcher;

/// Prometheus metrics
pub mod metrics;

/// Payload persistence
pub mod output;

/// Call quota admission
pub mod quota;

/// Checkpointing and failure log
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use catalog::CatalogEntry;
pub use downloader::task::FetchTask;

/// Report frequency class of a weather station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Sub-hourly observations
    Subhourly,
    /// Hourly observations
    Hourly,
    /// Daily summaries
    Daily,
}

impl ReportType {
    /// All report types in catalog grouping order
    pub const ALL: [ReportType; 3] = [ReportType::Subhourly, ReportType::Hourly, ReportType::Daily];

    /// Path segment and provider endpoint name
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Subhourly => "subhourly",
            ReportType::Hourly => "hourly",
            ReportType::Daily => "daily",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subhourly" => Ok(ReportType::Subhourly),
            "hourly" => Ok(ReportType::Hourly),
            "daily" => Ok(ReportType::Daily),
            _ => Err(format!(
                "Invalid report type: {s}. Valid options: subhourly, hourly, daily"
            )),
        }
    }
}
