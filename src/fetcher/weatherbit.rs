//! Weatherbit history archive adapter
//!
//! Implements [`ArchiveFetcher`] against `{base}/history/{report}` and
//! [`QuotaSource`] against `{base}/subscription/usage`.
//!
//! The history endpoint treats `end_date` as exclusive, while tasks carry
//! inclusive windows, so requests send the day after the task's last day.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::downloader::config::UnparseablePolicy;
use crate::downloader::rate_limit::RateLimiter;
use crate::downloader::task::FetchTask;
use crate::fetcher::failure::extract_failure_kind;
use crate::fetcher::{
    classify_body, ArchiveFetcher, FailureKind, FailureReason, FetchOutcome, FetcherError,
    FetcherResult,
};
use crate::metrics::HttpRequestMetrics;
use crate::quota::{QuotaError, QuotaSource, QuotaStatus};

/// Default provider base URL
pub const DEFAULT_BASE_URL: &str = "https://api.weatherbit.io/v2.0";

/// Subscription usage as returned by the provider
#[derive(Debug, Deserialize)]
struct UsageResponse {
    historical_calls_remaining: Option<i64>,
    historical_calls_reset_ts: Option<i64>,
}

/// Weatherbit API client
#[derive(Clone)]
pub struct WeatherbitClient {
    client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: Option<Arc<RateLimiter>>,
    unparseable: UnparseablePolicy,
}

impl std::fmt::Debug for WeatherbitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherbitClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("unparseable", &self.unparseable)
            .finish()
    }
}

impl WeatherbitClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `base_url` - API root, e.g. `https://api.weatherbit.io/v2.0`
    /// * `api_key` - Provider key sent as the `key` query parameter
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> FetcherResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(FetcherError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{base_url}'"
            )));
        }
        if api_key.trim().is_empty() {
            return Err(FetcherError::InvalidConfig(
                "API key is empty (set --api-key or WEATHERBIT_API_KEY)".to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url,
            api_key,
            rate_limiter: None,
            unparseable: UnparseablePolicy::default(),
        })
    }

    /// Pace every request through a shared limiter
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Choose how unparseable success bodies are classified
    pub fn with_unparseable_policy(mut self, policy: UnparseablePolicy) -> Self {
        self.unparseable = policy;
        self
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// History endpoint of the task's report type
    pub fn history_endpoint(&self, task: &FetchTask) -> String {
        format!("{}/history/{}", self.base_url, task.report_type.as_str())
    }

    /// Query parameters for the task, API key excluded
    pub fn history_params(task: &FetchTask) -> Vec<(&'static str, String)> {
        vec![
            ("station", task.station_id.clone()),
            ("start_date", task.start_date.to_string()),
            ("end_date", exclusive_end(task.end_date).to_string()),
        ]
    }

    /// Usage endpoint
    pub fn usage_endpoint(&self) -> String {
        format!("{}/subscription/usage", self.base_url)
    }

}

fn exclusive_end(end: NaiveDate) -> NaiveDate {
    end.succ_opt().unwrap_or(end)
}

#[async_trait]
impl ArchiveFetcher for WeatherbitClient {
    async fn ready(&self) -> Result<(), FailureReason> {
        if let Some(limiter) = &self.rate_limiter {
            limiter
                .acquire()
                .await
                .map_err(|e| FailureReason::new(FailureKind::Network, e.to_string()))?;
        }
        Ok(())
    }

    async fn fetch(&self, task: &FetchTask) -> FetchOutcome {
        let url = self.history_endpoint(task);
        let mut params = Self::history_params(task);
        params.push(("key", self.api_key.clone()));

        let request_metrics = HttpRequestMetrics::start("history");
        let response = match self.client.get(&url).query(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                request_metrics.record_network_error();
                // The URL carries the API key
                let kind = extract_failure_kind(None, Some(&e));
                let e = e.without_url();
                warn!(task = %task, error = %e, "History request failed");
                return FetchOutcome::Failed(FailureReason::new(kind, e.to_string()));
            }
        };

        let status = response.status();
        request_metrics.record_complete(status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            warn!(task = %task, status = status.as_u16(), body = %snippet, "History request rejected");
            return FetchOutcome::Failed(FailureReason::from_http(
                Some(status),
                None,
                format!("HTTP {status}: {snippet}"),
            ));
        }

        match response.bytes().await {
            Ok(body) => {
                debug!(task = %task, bytes = body.len(), "History response received");
                classify_body(body, self.unparseable == UnparseablePolicy::Fail)
            }
            Err(e) => {
                let kind = extract_failure_kind(None, Some(&e));
                FetchOutcome::Failed(FailureReason::new(
                    kind,
                    format!("failed to read body: {}", e.without_url()),
                ))
            }
        }
    }
}

#[async_trait]
impl QuotaSource for WeatherbitClient {
    async fn remaining_calls(&self) -> Result<QuotaStatus, QuotaError> {
        let request_metrics = HttpRequestMetrics::start("usage");
        let response = self
            .client
            .get(self.usage_endpoint())
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                request_metrics.record_network_error();
                QuotaError::Unavailable(e.without_url().to_string())
            })?;

        let status = response.status();
        request_metrics.record_complete(status.as_u16());
        if !status.is_success() {
            return Err(QuotaError::Unavailable(format!(
                "usage endpoint returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| QuotaError::Unavailable(e.without_url().to_string()))?;
        parse_usage(&body)
    }
}

/// Parse the usage endpoint body into a [`QuotaStatus`]
pub fn parse_usage(body: &str) -> Result<QuotaStatus, QuotaError> {
    let usage: UsageResponse = serde_json::from_str(body)
        .map_err(|e| QuotaError::Unavailable(format!("unreadable usage response: {e}")))?;

    let remaining = usage.historical_calls_remaining.ok_or_else(|| {
        QuotaError::Unavailable("usage response has no historical_calls_remaining".to_string())
    })?;

    Ok(QuotaStatus {
        remaining: u64::try_from(remaining).unwrap_or(0),
        reset_at: usage
            .historical_calls_reset_ts
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    })
}
