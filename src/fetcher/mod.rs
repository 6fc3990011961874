//! Archive fetcher abstraction and the Weatherbit adapter

use crate::downloader::task::FetchTask;
use async_trait::async_trait;
use bytes::Bytes;

pub mod failure;
pub mod http;
pub mod weatherbit;

pub use failure::{FailureKind, FailureReason};
pub use weatherbit::WeatherbitClient;

/// Fetcher construction and transport errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP client could not be built or a request failed
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// API error response
    #[error("API error: {0}")]
    ApiError(String),

    /// Invalid configuration (base URL, API key)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Classified result of one fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A body that parsed as JSON
    Payload(Bytes),
    /// The provider had nothing for this window. The body (possibly empty)
    /// is kept so it can still be persisted.
    Empty(Bytes),
    /// Transport or protocol failure, eligible for retry
    Failed(FailureReason),
}

impl FetchOutcome {
    /// Whether the attempt failed
    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Retrieves the record set of one task from the remote archive
///
/// Implementations classify every response themselves; the worker never
/// inspects bodies. A fetcher must not panic on provider errors, it returns
/// [`FetchOutcome::Failed`] instead.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Wait until a request may be sent
    ///
    /// Client-side pacing happens here, before the attempt starts, so the
    /// fetch timeout never covers local queueing.
    async fn ready(&self) -> Result<(), FailureReason> {
        Ok(())
    }

    /// Fetch the record set covering `task`
    async fn fetch(&self, task: &FetchTask) -> FetchOutcome;
}

/// Decide between [`FetchOutcome::Payload`] and [`FetchOutcome::Empty`] for a
/// successful response body.
///
/// A body that parses as JSON is a payload. Blank bodies are empty. Other
/// bodies count as empty unless `unparseable_is_failure` is set.
pub fn classify_body(body: Bytes, unparseable_is_failure: bool) -> FetchOutcome {
    if body.iter().all(u8::is_ascii_whitespace) {
        return FetchOutcome::Empty(body);
    }

    match serde_json::from_slice::<serde::de::IgnoredAny>(&body) {
        Ok(_) => FetchOutcome::Payload(body),
        Err(e) if unparseable_is_failure => {
            FetchOutcome::Failed(FailureReason::new(FailureKind::Unparseable, e.to_string()))
        }
        Err(_) => FetchOutcome::Empty(body),
    }
}
