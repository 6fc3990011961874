//! HTTP client construction
//!
//! One `reqwest::Client` is built per run and shared (it is `Arc`-backed
//! internally) so all workers reuse the same connection pool.

use reqwest::Client;
use std::time::Duration;

use crate::fetcher::{FetcherError, FetcherResult};

/// HTTP connect timeout (seconds) - time to establish TCP connection
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build the shared client.
///
/// `request_timeout` bounds the whole request including the body; the worker
/// applies its own per-attempt timeout on top.
pub fn build_http_client(request_timeout: Duration) -> FetcherResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(request_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            FetcherError::HttpError(format!(
                "failed to build HTTP client: {e}. Check system TLS configuration."
            ))
        })
}
