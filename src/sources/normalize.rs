use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::Job;

/// How a provider encodes its posting date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `DD/MM/YYYY`, midnight UTC.
    DayMonthYear,
    /// `YYYY-MM-DDTHH:MM:SSZ`.
    IsoUtc,
}

/// Per-provider field mapping into the canonical job shape.
///
/// Paths are dot-separated lookups into the raw JSON object, so
/// `company.display_name` reads `record["company"]["display_name"]`.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub source: &'static str,
    pub id: &'static str,
    pub title: &'static str,
    pub company: &'static str,
    pub location: &'static str,
    pub url: &'static str,
    pub posted_at: &'static str,
    pub date_format: DateFormat,
}

pub const REED_FIELDS: FieldMap = FieldMap {
    source: "reed",
    id: "jobId",
    title: "jobTitle",
    company: "employerName",
    location: "locationName",
    url: "jobUrl",
    posted_at: "date",
    date_format: DateFormat::DayMonthYear,
};

pub const ADZUNA_FIELDS: FieldMap = FieldMap {
    source: "adzuna",
    id: "id",
    title: "title",
    company: "company.display_name",
    location: "location.display_name",
    url: "redirect_url",
    posted_at: "created",
    date_format: DateFormat::IsoUtc,
};

fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |node, key| node.get(key))
}

/// String or number at `path`, trimmed; blanks and other JSON types are absent.
fn text_at(record: &Value, path: &str) -> Option<String> {
    match lookup(record, path)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_date(value: &str, format: DateFormat) -> Option<DateTime<Utc>> {
    match format {
        DateFormat::DayMonthYear => NaiveDate::parse_from_str(value, "%d/%m/%Y")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        DateFormat::IsoUtc => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ")
            .ok()
            .map(|dt| dt.and_utc()),
    }
}

/// Map one raw provider record to a job, or `None` when it lacks an id or title.
pub fn normalize_record(map: &FieldMap, record: &Value) -> Option<Job> {
    let source_job_id = text_at(record, map.id)?;
    let title = text_at(record, map.title)?;

    Some(Job {
        source: map.source.to_string(),
        source_job_id,
        title,
        company: text_at(record, map.company),
        location: text_at(record, map.location),
        url: text_at(record, map.url),
        posted_at: text_at(record, map.posted_at).and_then(|d| parse_date(&d, map.date_format)),
    })
}

/// Normalize the `results` array of a provider response, dropping bad entries.
pub fn normalize_results(map: &FieldMap, body: &Value) -> Vec<Job> {
    let Some(results) = body.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    let jobs: Vec<Job> = results
        .iter()
        .filter_map(|r| normalize_record(map, r))
        .collect();

    let dropped = results.len() - jobs.len();
    if dropped > 0 {
        tracing::debug!(
            "Dropped {} malformed {} record(s) out of {}",
            dropped,
            map.source,
            results.len()
        );
    }
    jobs
}
