use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CollectorError;
use crate::models::JobFilter;

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const MAX_SEARCH_LIMIT: usize = 500;
const MAX_NAME_LEN: usize = 100;

/// A named, persisted filter over the stored jobs.
///
/// Notification history is not part of this record; it lives in the
/// `SeenStore` keyed by `name`, so replacing a search never resets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedSearch {
    pub name: String,
    pub q: Option<String>,
    pub source: Option<String>,
    pub location: Option<String>,
    pub posted_after: Option<NaiveDate>,
    pub limit: usize,
    pub updated_at: DateTime<Utc>,
}

impl SavedSearch {
    pub fn filter(&self) -> JobFilter {
        JobFilter::new(
            self.q.as_deref(),
            self.source.as_deref(),
            self.location.as_deref(),
            self.posted_after,
        )
    }
}

/// Create-or-replace payload for a saved search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedSearchInput {
    pub name: String,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub posted_after: Option<NaiveDate>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl SavedSearchInput {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            q: None,
            source: None,
            location: None,
            posted_after: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Stamp the input into a stored record.
    pub fn into_saved(self, updated_at: DateTime<Utc>) -> SavedSearch {
        SavedSearch {
            name: self.name,
            q: self.q,
            source: self.source,
            location: self.location,
            posted_after: self.posted_after,
            limit: self.limit,
            updated_at,
        }
    }
}

/// Saved search as returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedSearchView {
    #[serde(flatten)]
    pub search: SavedSearch,
    pub seen_count: usize,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and normalize a saved-search payload.
///
/// The name is trimmed, blank optional filters become `None`.
pub fn validate_saved_search(input: SavedSearchInput) -> Result<SavedSearchInput, CollectorError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(CollectorError::Validation(
            "Saved search name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CollectorError::Validation(format!(
            "Saved search name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    if input.limit == 0 || input.limit > MAX_SEARCH_LIMIT {
        return Err(CollectorError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_SEARCH_LIMIT
        )));
    }

    Ok(SavedSearchInput {
        name,
        q: clean(input.q),
        source: clean(input.source),
        location: clean(input.location),
        posted_after: input.posted_after,
        limit: input.limit,
    })
}
