//! Download configuration constants and the resolved run configuration

use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of days the provider serves in one history request.
pub const MAX_WINDOW_DAYS: u64 = 31;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 8;

/// Upper bound on workers. Every worker holds one request in flight against a
/// provider with per-key rate limits, so more workers mostly buys 429s.
pub const MAX_WORKERS: usize = 64;

/// Retry rounds between continue/stop decisions.
pub const DEFAULT_RETRY_ROUND_SIZE: u32 = 5;

/// Retry rounds allowed in unattended mode.
pub const DEFAULT_MAX_RETRY_ROUNDS: u32 = 5;

/// Per-attempt fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Initial backoff delay between retry rounds in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay between retry rounds in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Default directory for checkpoint, failure log and run lock.
pub const DEFAULT_STATE_DIR: &str = ".weather-state";

/// Default output root.
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// Calculate exponential backoff delay starting from `base`
pub fn calculate_backoff(base: Duration, retry_count: u32) -> Duration {
    let base_ms = base.as_millis().min(u128::from(u64::MAX)) as u64;
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(retry_count));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// What to do with a successful response whose body is not valid JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnparseablePolicy {
    /// Count it as an empty result and keep it on disk
    #[default]
    Empty,
    /// Treat it as a failed fetch eligible for retry
    Fail,
}

/// Fully resolved configuration of one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of concurrent workers (clamped to the admitted task count)
    pub workers: usize,
    /// Root directory of downloaded payloads
    pub output_dir: PathBuf,
    /// Directory of checkpoint, failure log and run lock
    pub state_dir: PathBuf,
    /// Timeout of a single fetch attempt
    pub fetch_timeout: Duration,
    /// Base delay between retry rounds (doubles each round, capped)
    pub retry_delay: Duration,
    /// Whether empty results are written to disk
    pub write_empty_payloads: bool,
    /// Allow a fresh run to replace a checkpoint that still has deferred work
    pub overwrite_checkpoint: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            retry_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            write_empty_payloads: true,
            overwrite_checkpoint: false,
        }
    }
}

impl RunConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("worker count must be at least 1".to_string());
        }
        if self.workers > MAX_WORKERS {
            return Err(format!(
                "worker count {} exceeds maximum of {MAX_WORKERS}",
                self.workers
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err("fetch timeout must be positive".to_string());
        }
        Ok(())
    }
}
