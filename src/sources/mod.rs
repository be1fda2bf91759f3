pub mod adzuna;
pub mod normalize;
pub mod reed;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CollectorError;
use crate::models::Job;

pub use adzuna::AdzunaSource;
pub use reed::ReedSource;

/// Provider-agnostic query passed to every source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceQuery {
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Per-provider result cap; `None` uses the provider's configured default.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Result page, for providers that paginate.
    #[serde(default)]
    pub page: Option<u32>,
}

impl SourceQuery {
    pub fn new(keywords: &str, location: Option<&str>) -> Self {
        Self {
            keywords: keywords.to_string(),
            location: location
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
            limit: None,
            page: None,
        }
    }
}

/// A job-search provider that yields canonical jobs.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Provider tag, also the `source` of every job it returns.
    fn name(&self) -> &str;
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Job>, CollectorError>;
}

/// Shared reqwest client for provider and mail calls.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, CollectorError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CollectorError::Upstream(format!("Failed to build HTTP client: {}", e)))
}

/// Map a provider HTTP status into the upstream error kinds.
pub fn classify_status(source: &str, status: StatusCode, body: &str) -> Result<(), CollectorError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(CollectorError::UpstreamAuth(format!(
            "{} auth failed ({}); check its credentials",
            source,
            status.as_u16()
        )));
    }
    if status.is_client_error() || status.is_server_error() {
        let snippet: String = body.chars().take(200).collect();
        return Err(CollectorError::Upstream(format!(
            "{} error {}: {}",
            source,
            status.as_u16(),
            snippet
        )));
    }
    Ok(())
}

/// Read a provider response body as JSON after classifying its status.
pub async fn read_json(source: &str, response: reqwest::Response) -> Result<Value, CollectorError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CollectorError::Upstream(format!("{} response read failed: {}", source, e)))?;
    classify_status(source, status, &body)?;
    serde_json::from_str(&body)
        .map_err(|e| CollectorError::Upstream(format!("{} returned invalid JSON: {}", source, e)))
}

pub fn transport_error(source: &str, err: reqwest::Error) -> CollectorError {
    if err.is_timeout() {
        CollectorError::Upstream(format!("{} request timed out", source))
    } else {
        CollectorError::Upstream(format!("{} request failed: {}", source, err))
    }
}
