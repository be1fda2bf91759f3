use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::errors::CollectorError;
use crate::models::{Job, JobFilter, SavedSearch};
use crate::storage::{JobStore, SavedSearchStore, SeenStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    source_job_id TEXT NOT NULL,
    title TEXT NOT NULL,
    company TEXT,
    location TEXT,
    url TEXT,
    posted_at INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS saved_searches (
    name TEXT PRIMARY KEY,
    q TEXT,
    source TEXT,
    location TEXT,
    posted_after TEXT,
    result_limit INTEGER NOT NULL DEFAULT 50,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS seen_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_name TEXT NOT NULL,
    job_uid TEXT NOT NULL,
    seen_at TEXT NOT NULL,
    CONSTRAINT uq_seen_search_job UNIQUE (search_name, job_uid)
);

CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs(source);
CREATE INDEX IF NOT EXISTS idx_jobs_posted_at ON jobs(posted_at);
CREATE INDEX IF NOT EXISTS idx_seen_search ON seen_jobs(search_name);
"#;

const JOB_COLUMNS: &str = "source, source_job_id, title, company, location, url, posted_at";

// Listing order: posted_at desc with nulls last, then newest insertion. The
// AUTOINCREMENT id is assigned on first insert and survives DO UPDATE.
const LISTING_ORDER: &str = "ORDER BY posted_at IS NULL, posted_at DESC, id DESC";

/// Relational backend on a single SQLite connection.
///
/// `posted_at` is stored as integer microseconds since the epoch so ordering
/// and the `posted_after` bound compare numerically.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, CollectorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn in_memory() -> Result<Self, CollectorError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, CollectorError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CollectorError> {
        self.conn
            .lock()
            .map_err(|_| CollectorError::Storage("SQLite connection lock poisoned".to_string()))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let posted_micros: Option<i64> = row.get(6)?;
        Ok(Job {
            source: row.get(0)?,
            source_job_id: row.get(1)?,
            title: row.get(2)?,
            company: row.get(3)?,
            location: row.get(4)?,
            url: row.get(5)?,
            posted_at: posted_micros.and_then(DateTime::from_timestamp_micros),
        })
    }

    fn row_to_search(row: &rusqlite::Row) -> rusqlite::Result<SavedSearch> {
        let posted_after: Option<String> = row.get(4)?;
        let posted_after = posted_after
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))
            })
            .transpose()?;
        let updated_at: String = row.get(6)?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);
        let limit: i64 = row.get(5)?;

        Ok(SavedSearch {
            name: row.get(0)?,
            q: row.get(1)?,
            source: row.get(2)?,
            location: row.get(3)?,
            posted_after,
            limit: limit.max(0) as usize,
            updated_at,
        })
    }
}

/// Translate a `JobFilter` into a WHERE clause with positional arguments.
///
/// `lower()` and `instr()` give the same ASCII-folded substring semantics as
/// `JobFilter::matches`; `LIKE` is avoided so `%` and `_` in tokens are literal.
fn filter_clause(filter: &JobFilter) -> (String, Vec<Value>) {
    let mut sql = String::from("WHERE 1=1");
    let mut args: Vec<Value> = Vec::new();

    if let Some(ref source) = filter.source {
        sql.push_str(" AND lower(source) = ?");
        args.push(Value::Text(source.clone()));
    }

    if let Some(bound) = filter.posted_after_bound() {
        sql.push_str(" AND posted_at IS NOT NULL AND posted_at >= ?");
        args.push(Value::Integer(bound.timestamp_micros()));
    }

    if let Some(ref location) = filter.location {
        sql.push_str(" AND location IS NOT NULL AND instr(lower(location), ?) > 0");
        args.push(Value::Text(location.clone()));
    }

    for token in &filter.tokens {
        sql.push_str(
            " AND (instr(lower(title), ?) > 0 \
             OR instr(lower(coalesce(company, '')), ?) > 0 \
             OR instr(lower(coalesce(location, '')), ?) > 0)",
        );
        for _ in 0..3 {
            args.push(Value::Text(token.clone()));
        }
    }

    (sql, args)
}

fn limit_value(limit: usize) -> Value {
    Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn upsert_many(&self, jobs: &[Job]) -> Result<usize, CollectorError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            // The WHERE on DO UPDATE skips identical rows, so `execute`
            // reports 1 only for inserts and real changes.
            let mut stmt = tx.prepare(
                "INSERT INTO jobs (uid, source, source_job_id, title, company, location, url, posted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(uid) DO UPDATE SET
                    source = excluded.source,
                    source_job_id = excluded.source_job_id,
                    title = excluded.title,
                    company = excluded.company,
                    location = excluded.location,
                    url = excluded.url,
                    posted_at = excluded.posted_at
                 WHERE jobs.title IS NOT excluded.title
                    OR jobs.company IS NOT excluded.company
                    OR jobs.location IS NOT excluded.location
                    OR jobs.url IS NOT excluded.url
                    OR jobs.posted_at IS NOT excluded.posted_at
                    OR jobs.source IS NOT excluded.source
                    OR jobs.source_job_id IS NOT excluded.source_job_id",
            )?;
            for incoming in jobs {
                let job = incoming.stored();
                changed += stmt.execute(params![
                    job.uid(),
                    job.source,
                    job.source_job_id,
                    job.title,
                    job.company,
                    job.location,
                    job.url,
                    job.posted_at.map(|d| d.timestamp_micros()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Job>, CollectorError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM jobs {} LIMIT ?1", JOB_COLUMNS, LISTING_ORDER);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([limit_value(limit)], Self::row_to_job)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn search(&self, filter: &JobFilter, limit: usize) -> Result<Vec<Job>, CollectorError> {
        let (clause, mut args) = filter_clause(filter);
        args.push(limit_value(limit));

        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM jobs {} {} LIMIT ?",
            JOB_COLUMNS, clause, LISTING_ORDER
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), Self::row_to_job)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn count(&self) -> Result<usize, CollectorError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl SavedSearchStore for SqliteStore {
    async fn upsert_search(&self, search: &SavedSearch) -> Result<(), CollectorError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO saved_searches (name, q, source, location, posted_after, result_limit, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                q = excluded.q,
                source = excluded.source,
                location = excluded.location,
                posted_after = excluded.posted_after,
                result_limit = excluded.result_limit,
                updated_at = excluded.updated_at",
            params![
                search.name,
                search.q,
                search.source,
                search.location,
                search.posted_after.map(|d| d.format("%Y-%m-%d").to_string()),
                limit_value(search.limit),
                search.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn get_search(&self, name: &str) -> Result<Option<SavedSearch>, CollectorError> {
        let conn = self.conn()?;
        let search = conn
            .query_row(
                "SELECT name, q, source, location, posted_after, result_limit, updated_at
                 FROM saved_searches WHERE name = ?1",
                [name],
                Self::row_to_search,
            )
            .optional()?;
        Ok(search)
    }

    async fn list_searches(&self) -> Result<Vec<SavedSearch>, CollectorError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, q, source, location, posted_after, result_limit, updated_at
             FROM saved_searches ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_search)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl SeenStore for SqliteStore {
    async fn count_seen(&self, search_name: &str) -> Result<usize, CollectorError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM seen_jobs WHERE search_name = ?1",
            [search_name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn mark_seen(
        &self,
        search_name: &str,
        uids: &[String],
    ) -> Result<Vec<String>, CollectorError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let seen_at = Utc::now().to_rfc3339();
        let mut inserted = Vec::new();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO seen_jobs (search_name, job_uid, seen_at) VALUES (?1, ?2, ?3)",
            )?;
            for uid in uids {
                if stmt.execute(params![search_name, uid, seen_at])? == 1 {
                    inserted.push(uid.clone());
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    async fn seen_among(
        &self,
        search_name: &str,
        uids: &[String],
    ) -> Result<HashSet<String>, CollectorError> {
        if uids.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = vec!["?"; uids.len()].join(", ");
        let sql = format!(
            "SELECT job_uid FROM seen_jobs WHERE search_name = ? AND job_uid IN ({})",
            placeholders
        );
        let mut args: Vec<&str> = Vec::with_capacity(uids.len() + 1);
        args.push(search_name);
        args.extend(uids.iter().map(String::as_str));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SavedSearchInput;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn job(id: &str, title: &str) -> Job {
        Job {
            source: "adzuna".to_string(),
            source_job_id: id.to_string(),
            title: title.to_string(),
            company: Some("Globex".to_string()),
            location: None,
            url: None,
            posted_at: Some(Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_identical_reupsert_counts_zero() {
        let store = SqliteStore::in_memory().expect("open");
        assert_eq!(store.upsert_many(&[job("1", "Dev")]).await.expect("upsert"), 1);
        assert_eq!(store.upsert_many(&[job("1", "Dev")]).await.expect("upsert"), 0);
        assert_eq!(store.upsert_many(&[job("1", "Lead Dev")]).await.expect("upsert"), 1);
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_job_round_trips_fields() {
        let store = SqliteStore::in_memory().expect("open");
        let original = job("9", "Data Engineer");
        store.upsert_many(&[original.clone()]).await.expect("upsert");
        let listed = store.list(10).await.expect("list");
        assert_eq!(listed, vec![original]);
    }

    #[tokio::test]
    async fn test_search_tokens_are_literal_not_like_patterns() {
        let store = SqliteStore::in_memory().expect("open");
        store
            .upsert_many(&[job("1", "100% remote"), job("2", "1000 remote")])
            .await
            .expect("upsert");
        let filter = JobFilter::new(Some("100%"), None, None, None);
        let hits = store.search(&filter, 10).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_job_id, "1");
    }

    #[tokio::test]
    async fn test_saved_search_round_trips() {
        let store = SqliteStore::in_memory().expect("open");
        let mut input = SavedSearchInput::named("go");
        input.q = Some("engineer".to_string());
        input.posted_after = NaiveDate::from_ymd_opt(2024, 1, 1);
        input.limit = 10;
        let saved = input.into_saved(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        store.upsert_search(&saved).await.expect("upsert");
        let fetched = store.get_search("go").await.expect("get").expect("found");
        assert_eq!(fetched, saved);
        assert!(store.get_search("missing").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let path = tmp_dir.path().join("jobc.db");
        {
            let store = SqliteStore::open(&path).expect("open");
            store.upsert_many(&[job("1", "Dev")]).await.expect("upsert");
            store
                .mark_seen("go", &["adzuna:1".to_string()])
                .await
                .expect("mark");
        }
        {
            let store = SqliteStore::open(&path).expect("reopen");
            assert_eq!(store.count().await.expect("count"), 1);
            assert_eq!(store.count_seen("go").await.expect("count"), 1);
            assert_eq!(store.path(), Some(path.as_path()));
        }
    }

    #[tokio::test]
    async fn test_mark_seen_reports_only_inserted_pairs() {
        let store = SqliteStore::in_memory().expect("open");
        let uids = vec!["adzuna:1".to_string(), "adzuna:2".to_string()];
        assert_eq!(store.mark_seen("go", &uids).await.expect("mark"), uids);
        assert!(store.mark_seen("go", &uids).await.expect("mark").is_empty());
        assert_eq!(store.mark_seen("rust", &uids[..1]).await.expect("mark"), uids[..1]);
    }

    #[tokio::test]
    async fn test_seen_among_matches_only_recorded_pairs() {
        let store = SqliteStore::in_memory().expect("open");
        store
            .mark_seen("go", &["adzuna:1".to_string()])
            .await
            .expect("mark");

        let asked = vec!["adzuna:1".to_string(), "adzuna:2".to_string()];
        let seen = store.seen_among("go", &asked).await.expect("seen");
        assert_eq!(seen, HashSet::from(["adzuna:1".to_string()]));
        assert!(store.seen_among("rust", &asked).await.expect("seen").is_empty());
        assert!(store.seen_among("go", &[]).await.expect("seen").is_empty());
        assert_eq!(store.count_seen("go").await.expect("count"), 1);
    }
}
