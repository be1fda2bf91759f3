use async_trait::async_trait;

use super::normalize::{normalize_results, REED_FIELDS};
use super::{read_json, transport_error, JobSource, SourceQuery};
use crate::errors::CollectorError;
use crate::models::Job;

pub const REED_BASE_URL: &str = "https://www.reed.co.uk/api/1.0";

/// Reed jobseeker API. Authenticates with the API key as the basic-auth user.
pub struct ReedSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_limit: usize,
}

impl ReedSource {
    pub fn new(client: reqwest::Client, api_key: &str, default_limit: usize) -> Self {
        Self::with_base_url(client, api_key, default_limit, REED_BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        api_key: &str,
        default_limit: usize,
        base_url: &str,
    ) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_limit,
        }
    }
}

#[async_trait]
impl JobSource for ReedSource {
    fn name(&self) -> &str {
        REED_FIELDS.source
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Job>, CollectorError> {
        let take = query.limit.unwrap_or(self.default_limit).to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("keywords", query.keywords.as_str()),
            ("resultsToTake", take.as_str()),
        ];
        if let Some(ref loc) = query.location {
            params.push(("locationName", loc.as_str()));
        }

        tracing::debug!("Fetching reed jobs for '{}'", query.keywords);
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .basic_auth(&self.api_key, Some(""))
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error("reed", e))?;

        let body = read_json("reed", response).await?;
        Ok(normalize_results(&REED_FIELDS, &body))
    }
}
