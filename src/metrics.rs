//! Observability metrics for weather archive downloads
//!
//! Counters and histograms are recorded through the `metrics` facade and are
//! no-ops until [`init_metrics`] installs the Prometheus exporter, so library
//! users and tests pay nothing for them.
//!
//! ## Recorded series
//!
//! - `tasks_downloaded_total`, `tasks_empty_total`, `tasks_failed_total{reason}`
//! - `fetch_duration_seconds`
//! - `http_requests_total{endpoint,status}`, `http_request_duration_seconds`
//! - `retry_rounds_total`, `retry_backoff_duration_seconds`
//! - `rate_limit_queue_wait_seconds`, `rate_limit_permits_available`
//! - `quota_calls_remaining`

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not be installed (address in use, recorder already set)
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// Initialize metrics system with Prometheus exporter
///
/// Must run inside a tokio runtime. Idempotent: later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address of the scrape endpoint (e.g., "0.0.0.0:9090")
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        METRICS_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(MetricsError::Install(e.to_string()));
    }

    describe_counter!(
        "tasks_downloaded_total",
        Unit::Count,
        "Tasks persisted with a parseable payload"
    );
    describe_counter!(
        "tasks_empty_total",
        Unit::Count,
        "Tasks that returned an empty result"
    );
    describe_counter!(
        "tasks_failed_total",
        Unit::Count,
        "Failed fetch attempts"
    );
    describe_histogram!(
        "fetch_duration_seconds",
        Unit::Seconds,
        "Duration of one fetch attempt including the write"
    );
    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the provider"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_counter!("retry_rounds_total", Unit::Count, "Retry rounds started");
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Delay before a retry round"
    );
    describe_histogram!(
        "rate_limit_queue_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for rate limit permits"
    );
    describe_gauge!(
        "rate_limit_permits_available",
        Unit::Count,
        "Currently available rate limit permits"
    );
    describe_gauge!(
        "quota_calls_remaining",
        Unit::Count,
        "History calls left at the start of the run"
    );

    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.load(Ordering::SeqCst)
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one HTTP request
pub struct HttpRequestMetrics {
    endpoint: &'static str,
    start_time: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Start recording a new HTTP request
    pub fn start(endpoint: &'static str) -> Self {
        let correlation_id = generate_correlation_id();
        debug!(correlation_id = %correlation_id, endpoint, "Starting HTTP request");

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record completion of the HTTP request
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint,
            "status" => status_code.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds", "endpoint" => self.endpoint)
            .record(duration.as_secs_f64());

        if status_code == 429 {
            warn!(
                correlation_id = %self.correlation_id,
                endpoint = self.endpoint,
                duration_ms = duration.as_millis(),
                "Rate limit error (429) received"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    /// Record a network error (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint,
            "status" => "network_error",
        )
        .increment(1);
        histogram!("http_request_duration_seconds", "endpoint" => self.endpoint)
            .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = self.endpoint,
            duration_ms = duration.as_millis(),
            "Network error recorded"
        );
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Outcome label of a finished task attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcomeLabel {
    /// Payload written
    Downloaded,
    /// Empty result
    Empty,
    /// Failed attempt, with the failure label
    Failed(&'static str),
}

/// Record one task attempt
pub fn record_task_outcome(outcome: TaskOutcomeLabel, duration: Duration) {
    match outcome {
        TaskOutcomeLabel::Downloaded => counter!("tasks_downloaded_total").increment(1),
        TaskOutcomeLabel::Empty => counter!("tasks_empty_total").increment(1),
        TaskOutcomeLabel::Failed(reason) => {
            counter!("tasks_failed_total", "reason" => reason).increment(1)
        }
    }
    histogram!("fetch_duration_seconds").record(duration.as_secs_f64());
}

/// Record the start of a retry round and its backoff
pub fn record_retry_round(round: u32, backoff: Duration, pending: usize) {
    counter!("retry_rounds_total").increment(1);
    histogram!("retry_backoff_duration_seconds").record(backoff.as_secs_f64());

    debug!(
        round,
        pending,
        backoff_ms = backoff.as_millis(),
        "Retry round recorded"
    );
}

/// Record time spent waiting for a rate limit slot
pub fn record_rate_limit_wait(wait: Duration, available: usize) {
    histogram!("rate_limit_queue_wait_seconds").record(wait.as_secs_f64());
    gauge!("rate_limit_permits_available").set(available as f64);
}

/// Record the provider's remaining call budget
pub fn record_quota_remaining(remaining: u64) {
    gauge!("quota_calls_remaining").set(remaining as f64);
}
