//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Days, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weather_archive_downloader::downloader::RunConfig;
use weather_archive_downloader::fetcher::{
    ArchiveFetcher, FailureKind, FailureReason, FetchOutcome,
};
use weather_archive_downloader::quota::{QuotaError, QuotaSource, QuotaStatus};
use weather_archive_downloader::shutdown::SharedShutdown;
use weather_archive_downloader::{FetchTask, ReportType};

/// `n` one-day tasks on consecutive days for station `S{i}`
pub fn tasks(n: u64) -> Vec<FetchTask> {
    let base = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
    (0..n)
        .map(|i| {
            let day = base.checked_add_days(Days::new(i)).unwrap();
            FetchTask::new(format!("S{i}"), ReportType::Daily, day, day)
        })
        .collect()
}

/// Configuration rooted in `dir` with no backoff between retry rounds
pub fn config(dir: &Path, workers: usize) -> RunConfig {
    RunConfig {
        workers,
        output_dir: dir.join("data"),
        state_dir: dir.join("state"),
        fetch_timeout: Duration::from_secs(5),
        retry_delay: Duration::ZERO,
        ..RunConfig::default()
    }
}

/// Fetcher answering from a per-station script
#[derive(Default)]
pub struct ScriptedFetcher {
    /// Stations failing this many times before succeeding
    fail_first: HashMap<String, u32>,
    /// Stations that never succeed
    always_fail: HashSet<String>,
    /// Stations answering with an empty body
    empty: HashSet<String>,
    /// Request shutdown once this many fetches happened
    shutdown_after: Option<(usize, SharedShutdown)>,
    calls: Mutex<HashMap<FetchTask, u32>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(mut self, station: &str, times: u32) -> Self {
        self.fail_first.insert(station.to_string(), times);
        self
    }

    pub fn always_failing(mut self, station: &str) -> Self {
        self.always_fail.insert(station.to_string());
        self
    }

    pub fn empty_for(mut self, station: &str) -> Self {
        self.empty.insert(station.to_string());
        self
    }

    pub fn shutting_down_after(mut self, fetches: usize, shutdown: SharedShutdown) -> Self {
        self.shutdown_after = Some((fetches, shutdown));
        self
    }

    /// Attempts made for `task`
    pub fn calls_for(&self, task: &FetchTask) -> u32 {
        self.calls.lock().unwrap().get(task).copied().unwrap_or(0)
    }

    /// Attempts made in total
    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ArchiveFetcher for ScriptedFetcher {
    async fn fetch(&self, task: &FetchTask) -> FetchOutcome {
        let (attempt, total) = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(task.clone()).or_insert(0);
            *count += 1;
            let attempt = *count;
            (attempt, calls.values().sum::<u32>() as usize)
        };

        if let Some((after, shutdown)) = &self.shutdown_after {
            if total >= *after {
                shutdown.request_shutdown();
            }
        }

        let station = task.station_id.as_str();
        let failing = self.always_fail.contains(station)
            || self.fail_first.get(station).is_some_and(|n| attempt <= *n);
        if failing {
            return FetchOutcome::Failed(FailureReason::new(
                FailureKind::ServerError(503),
                "HTTP 503 Service Unavailable",
            ));
        }
        if self.empty.contains(station) {
            return FetchOutcome::Empty(Bytes::new());
        }
        FetchOutcome::Payload(Bytes::from(format!(
            "{{\"station_id\":\"{}\",\"data\":[]}}",
            task.station_id
        )))
    }
}

/// Quota source returning a fixed answer
pub struct FixedQuota(pub Result<QuotaStatus, String>);

impl FixedQuota {
    pub fn remaining(calls: u64) -> Arc<Self> {
        Arc::new(Self(Ok(QuotaStatus::new(calls))))
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self(Err("connection refused".to_string())))
    }
}

#[async_trait]
impl QuotaSource for FixedQuota {
    async fn remaining_calls(&self) -> Result<QuotaStatus, QuotaError> {
        self.0.clone().map_err(QuotaError::Unavailable)
    }
}
