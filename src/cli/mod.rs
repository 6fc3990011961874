//! Command line interface
//!
//! `run` downloads a fresh job from a station catalog, `resume` continues the
//! job recorded in the checkpoint, `retry-failed` re-runs the failure log and
//! `status` shows where a state directory stands.

pub mod error;
pub mod prompt;
pub mod run;
pub mod summary;

pub use error::CliError;
pub use prompt::TerminalPrompt;
pub use run::execute;

use crate::downloader::config::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_RETRY_ROUNDS, DEFAULT_OUTPUT_DIR,
    DEFAULT_RETRY_ROUND_SIZE, DEFAULT_STATE_DIR, DEFAULT_WORKERS, INITIAL_BACKOFF_MS,
    MAX_WORKERS,
};
use crate::downloader::{RunConfig, UnparseablePolicy};
use crate::fetcher::weatherbit::DEFAULT_BASE_URL;
use crate::ReportType;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Parse a `YYYY-MM-DD` date
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("'{s}' is not a YYYY-MM-DD date: {e}"))
}

/// Parse and validate the worker count
fn parse_workers(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("workers must be at least 1".to_string());
    }
    if value > MAX_WORKERS {
        return Err(format!("workers {value} exceeds maximum of {MAX_WORKERS}"));
    }
    Ok(value)
}

/// Weather archive downloader CLI
#[derive(Parser, Debug)]
#[command(name = "weather-archive-downloader")]
#[command(about = "Download historical weather station archives within the provider's call quota", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Directory holding the checkpoint, failure log and run lock
    #[arg(long, global = true, default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Root directory of downloaded payloads
    #[arg(long, global = true, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Number of concurrent workers (max 64)
    ///
    /// The admitted tasks are split into this many shards plus a remainder
    /// shard. Each shard fetches its tasks one after another.
    #[arg(long, global = true, default_value_t = DEFAULT_WORKERS, value_parser = parse_workers)]
    pub workers: usize,

    /// Provider API key
    #[arg(long, global = true, env = "WEATHERBIT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Provider API root; the quota endpoint lives under it too
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Timeout of a single fetch attempt in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub fetch_timeout_secs: u64,

    /// Client-side pacing of provider requests (unlimited when absent)
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub requests_per_minute: Option<u32>,

    /// Base delay between retry rounds in milliseconds (doubles each round)
    #[arg(long, global = true, default_value_t = INITIAL_BACKOFF_MS)]
    pub retry_delay_ms: u64,

    /// Retry rounds between continue/stop questions
    #[arg(long, global = true, default_value_t = DEFAULT_RETRY_ROUND_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub retry_round_size: u32,

    /// Do not write empty results to disk
    #[arg(long, global = true, default_value_t = false)]
    pub skip_empty: bool,

    /// Treat a non-empty body that is not JSON as a failed fetch
    #[arg(long, global = true, default_value_t = false)]
    pub unparseable_as_failure: bool,

    /// Never prompt; retry at most --max-retry-rounds rounds
    #[arg(long, global = true, default_value_t = false)]
    pub unattended: bool,

    /// Retry rounds allowed in unattended mode
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_RETRY_ROUNDS, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_retry_rounds: u32,

    /// Let `run` replace a checkpoint that still has deferred tasks
    #[arg(long, global = true, default_value_t = false)]
    pub overwrite_checkpoint: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Resolve the flags into the engine configuration
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            workers: self.workers,
            output_dir: self.output_dir.clone(),
            state_dir: self.state_dir.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            write_empty_payloads: !self.skip_empty,
            overwrite_checkpoint: self.overwrite_checkpoint,
        }
    }

    /// Classification of unparseable success bodies
    pub fn unparseable_policy(&self) -> UnparseablePolicy {
        if self.unparseable_as_failure {
            UnparseablePolicy::Fail
        } else {
            UnparseablePolicy::Empty
        }
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new job from a station catalog
    Run(RunArgs),

    /// Continue the job recorded in the checkpoint
    Resume,

    /// Re-run the tasks recorded in the failure log
    RetryFailed,

    /// Show checkpoint progress and failure log size
    Status,
}

/// Arguments of `run`
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Station catalog CSV (station_id,lat,lon,source,reports,country)
    #[arg(long)]
    pub catalog: PathBuf,

    /// First day to download (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date)]
    pub start: NaiveDate,

    /// Last day to download (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date)]
    pub end: NaiveDate,

    /// Report types to download, comma separated
    #[arg(long, value_delimiter = ',', default_value = "subhourly,hourly,daily")]
    pub report_types: Vec<ReportType>,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}
