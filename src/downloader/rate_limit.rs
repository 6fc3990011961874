//! Client-side request pacing
//!
//! A sliding-window limiter: each request takes one permit and the permit is
//! returned only after the window has elapsed, so at most `max_requests`
//! requests start within any window.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::debug;

/// Request-based rate limiter shared by all workers
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: usize,
    semaphore: Arc<Semaphore>,
    window: Duration,
}

impl RateLimiter {
    /// Create a request-based rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window (at least 1)
    /// * `window` - Time window for rate limit
    pub fn request_based(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            semaphore: Arc::new(Semaphore::new(max_requests)),
            window,
        }
    }

    /// Limiter allowing `requests` per minute
    pub fn per_minute(requests: u32) -> Self {
        Self::request_based(requests as usize, Duration::from_secs(60))
    }

    /// Configured request ceiling per window
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Permits currently available
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a request slot
    ///
    /// The owned permit is held for the full window by a detached task, then
    /// released by dropping it.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        let started = Instant::now();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RateLimitError::AcquireError(e.to_string()))?;

        let waited = started.elapsed();
        if waited > Duration::from_millis(100) {
            debug!(wait_ms = waited.as_millis(), "Rate limit slot acquired after wait");
        }
        crate::metrics::record_rate_limit_wait(waited, self.available());

        let window = self.window;
        tokio::spawn(async move {
            sleep(window).await;
            drop(permit);
        });

        Ok(())
    }
}

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Failed to acquire permits
    #[error("failed to acquire rate limit permits: {0}")]
    AcquireError(String),
}
