use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Job;

/// Search predicate shared by every `JobStore` backend.
///
/// All text is folded with ASCII lowercasing only. The SQLite backend relies
/// on `lower()`, which folds ASCII only, so both backends agree on every input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Lowercased `q` tokens; each must hit title, company or location.
    pub tokens: Vec<String>,
    /// Lowercased exact source tag.
    pub source: Option<String>,
    /// Lowercased location substring.
    pub location: Option<String>,
    pub posted_after: Option<NaiveDate>,
}

/// Query-string shape of a search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub source: Option<String>,
    pub location: Option<String>,
    pub posted_after: Option<NaiveDate>,
    pub limit: Option<usize>,
}

fn fold(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_ascii_lowercase())
}

fn contains_folded(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

impl JobFilter {
    pub fn new(
        q: Option<&str>,
        source: Option<&str>,
        location: Option<&str>,
        posted_after: Option<NaiveDate>,
    ) -> Self {
        let tokens = q
            .unwrap_or("")
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();
        Self {
            tokens,
            source: fold(source),
            location: fold(location),
            posted_after,
        }
    }

    pub fn from_params(params: &SearchParams) -> Self {
        Self::new(
            params.q.as_deref(),
            params.source.as_deref(),
            params.location.as_deref(),
            params.posted_after,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
            && self.source.is_none()
            && self.location.is_none()
            && self.posted_after.is_none()
    }

    /// Start of the `posted_after` day in UTC.
    pub fn posted_after_bound(&self) -> Option<DateTime<Utc>> {
        self.posted_after
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(ref source) = self.source {
            if job.source.to_ascii_lowercase() != *source {
                return false;
            }
        }

        if let Some(bound) = self.posted_after_bound() {
            match job.posted_at {
                Some(posted) if posted >= bound => {}
                _ => return false,
            }
        }

        if let Some(ref location) = self.location {
            if !contains_folded(job.location.as_deref(), location) {
                return false;
            }
        }

        self.tokens.iter().all(|tok| {
            contains_folded(Some(&job.title), tok)
                || contains_folded(job.company.as_deref(), tok)
                || contains_folded(job.location.as_deref(), tok)
        })
    }
}

/// Listing order: `posted_at` descending with nulls last, then the most
/// recently inserted record first.
pub fn listing_order(
    a_posted: Option<DateTime<Utc>>,
    a_seq: u64,
    b_posted: Option<DateTime<Utc>>,
    b_seq: u64,
) -> Ordering {
    // None sorts below Some, so a reversed comparison leaves nulls at the end.
    b_posted.cmp(&a_posted).then(b_seq.cmp(&a_seq))
}
