//! Failure classification for fetch attempts.
//!
//! Every failed attempt carries a [`FailureReason`]: a coarse [`FailureKind`]
//! used for metrics labels and operator hints, plus the raw message.

use reqwest::{Error as ReqwestError, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of fetch failures for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The attempt exceeded its timeout
    Timeout,
    /// Connection refused, DNS failure, or other offline scenarios
    Connection,
    /// HTTP 429 rate limit exceeded
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// Authentication failures (401/403)
    AuthFailed(u16),
    /// Other client errors (4xx, except 429)
    ClientError(u16),
    /// Body could not be read or parsed
    Unparseable,
    /// Generic fallback when no better classification fits
    Network,
}

impl FailureKind {
    /// User-friendly description string.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::AuthFailed(_) => "authentication failed",
            Self::ClientError(code) => match code {
                404 => "resource not found",
                _ => "client error",
            },
            Self::Unparseable => "unparseable response",
            Self::Network => "network error",
        }
    }

    /// Suggested remediation shown when a task is abandoned.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Timeout => "Increase --fetch-timeout-secs or lower --workers",
            Self::Connection => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Lower --requests-per-minute or --workers",
            Self::ServerError(_) => "The provider may be having issues, try retry-failed later",
            Self::AuthFailed(_) => "Verify the API key and that the plan includes history access",
            Self::ClientError(_) => "Check the station identifier and date range",
            Self::Unparseable => "Inspect the provider response or rerun without --unparseable-as-failure",
            Self::Network => "Check network connectivity and try again",
        }
    }

    /// Short stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::RateLimit => "rate_limit",
            Self::ServerError(_) => "server_error",
            Self::AuthFailed(_) => "auth_failed",
            Self::ClientError(_) => "client_error",
            Self::Unparseable => "unparseable",
            Self::Network => "network",
        }
    }
}

/// Why a fetch attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    /// Classification
    pub kind: FailureKind,
    /// Underlying message
    pub message: String,
}

impl FailureReason {
    /// Create a reason from a kind and message
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Attempt timed out after `after`
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("no response within {:.1}s", after.as_secs_f64()),
        )
    }

    /// Build a reason from an HTTP status and/or transport error
    pub fn from_http(status: Option<StatusCode>, err: Option<&ReqwestError>, message: impl Into<String>) -> Self {
        Self::new(extract_failure_kind(status, err), message)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)
    }
}

/// Extract a [`FailureKind`] from an HTTP status or reqwest error.
pub fn extract_failure_kind(status: Option<StatusCode>, err: Option<&ReqwestError>) -> FailureKind {
    if let Some(status) = status {
        match status.as_u16() {
            401 | 403 => return FailureKind::AuthFailed(status.as_u16()),
            429 => return FailureKind::RateLimit,
            _ => {}
        }

        if status.is_server_error() {
            return FailureKind::ServerError(status.as_u16());
        }

        if status.is_client_error() {
            return FailureKind::ClientError(status.as_u16());
        }
    }

    if let Some(err) = err {
        if err.is_timeout() {
            return FailureKind::Timeout;
        }

        if err.is_connect() {
            return FailureKind::Connection;
        }

        if err.is_decode() || err.is_body() {
            return FailureKind::Unparseable;
        }
    }

    FailureKind::Network
}
