use async_trait::async_trait;

use super::normalize::{normalize_results, ADZUNA_FIELDS};
use super::{read_json, transport_error, JobSource, SourceQuery};
use crate::errors::CollectorError;
use crate::models::Job;

pub const ADZUNA_BASE_URL: &str = "https://api.adzuna.com/v1/api";

pub struct AdzunaSource {
    client: reqwest::Client,
    app_id: String,
    app_key: String,
    country: String,
    base_url: String,
    default_limit: usize,
}

impl AdzunaSource {
    pub fn new(
        client: reqwest::Client,
        app_id: &str,
        app_key: &str,
        country: &str,
        default_limit: usize,
    ) -> Self {
        Self::with_base_url(client, app_id, app_key, country, default_limit, ADZUNA_BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        app_id: &str,
        app_key: &str,
        country: &str,
        default_limit: usize,
        base_url: &str,
    ) -> Self {
        Self {
            client,
            app_id: app_id.to_string(),
            app_key: app_key.to_string(),
            country: country.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_limit,
        }
    }
}

#[async_trait]
impl JobSource for AdzunaSource {
    fn name(&self) -> &str {
        ADZUNA_FIELDS.source
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Job>, CollectorError> {
        let per_page = query.limit.unwrap_or(self.default_limit).to_string();
        let page = query.page.unwrap_or(1);
        let mut params: Vec<(&str, &str)> = vec![
            ("app_id", self.app_id.as_str()),
            ("app_key", self.app_key.as_str()),
            ("what", query.keywords.as_str()),
            ("results_per_page", per_page.as_str()),
        ];
        if let Some(ref loc) = query.location {
            params.push(("where", loc.as_str()));
        }

        let url = format!(
            "{}/jobs/{}/search/{}",
            self.base_url, self.country, page
        );
        tracing::debug!("Fetching adzuna jobs for '{}' (page {})", query.keywords, page);
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error("adzuna", e))?;

        let body = read_json("adzuna", response).await?;
        Ok(normalize_results(&ADZUNA_FIELDS, &body))
    }
}
