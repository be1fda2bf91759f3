use std::sync::Arc;

use crate::errors::CollectorError;
use crate::models::search::MAX_SEARCH_LIMIT;
use crate::models::{Job, SavedSearch};
use crate::pipeline::SearchRegistry;
use crate::storage::Store;

/// Per-search novelty: which matching jobs have not been reported yet.
#[derive(Clone)]
pub struct SeenTracker {
    store: Arc<dyn Store>,
    registry: SearchRegistry,
}

impl SeenTracker {
    pub fn new(store: Arc<dyn Store>, registry: SearchRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn count_seen(&self, name: &str) -> Result<usize, CollectorError> {
        self.store.count_seen(name).await
    }

    /// Current matches for the search, without touching its seen set.
    pub async fn preview(&self, name: &str) -> Result<(SavedSearch, Vec<Job>), CollectorError> {
        self.matches(name, None).await
    }

    /// Current matches, each flagged with whether it was already reported.
    /// `limit` overrides the search's own limit for this read.
    pub async fn feed(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> Result<(SavedSearch, Vec<(Job, bool)>), CollectorError> {
        let (search, jobs) = self.matches(name, limit).await?;
        let uids: Vec<String> = jobs.iter().map(Job::uid).collect();
        let seen = self.store.seen_among(&search.name, &uids).await?;

        let entries = jobs
            .into_iter()
            .zip(uids)
            .map(|(job, uid)| (job, seen.contains(&uid)))
            .collect();
        Ok((search, entries))
    }

    /// How many current matches `compute_new_and_mark` would report, without
    /// marking any of them.
    pub async fn new_count(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> Result<(SavedSearch, usize), CollectorError> {
        let (search, entries) = self.feed(name, limit).await?;
        let fresh = entries.iter().filter(|(_, seen)| !seen).count();
        Ok((search, fresh))
    }

    async fn matches(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> Result<(SavedSearch, Vec<Job>), CollectorError> {
        let search = self.registry.require(name).await?;
        let limit = limit.unwrap_or(search.limit).min(MAX_SEARCH_LIMIT);
        let jobs = self.store.search(&search.filter(), limit).await?;
        Ok((search, jobs))
    }

    /// Return the matching jobs not yet reported for `name`, and record them
    /// as reported.
    ///
    /// A job counts as new only if this call inserted its seen pair, so two
    /// concurrent calls never both return the same job.
    pub async fn compute_new_and_mark(
        &self,
        name: &str,
    ) -> Result<(SavedSearch, Vec<Job>), CollectorError> {
        let (search, matches) = self.preview(name).await?;
        if matches.is_empty() {
            return Ok((search, matches));
        }

        let uids: Vec<String> = matches.iter().map(Job::uid).collect();
        let inserted = self.store.mark_seen(&search.name, &uids).await?;

        let mut inserted = inserted.into_iter().peekable();
        let mut fresh = Vec::with_capacity(inserted.len());
        // `mark_seen` preserves input order, so one forward pass pairs them up.
        for job in matches {
            if inserted.peek().map(|uid| *uid == job.uid()).unwrap_or(false) {
                inserted.next();
                fresh.push(job);
            }
        }

        tracing::debug!(
            "Search '{}': {} matches, {} new",
            search.name,
            uids.len(),
            fresh.len()
        );
        Ok((search, fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SavedSearchInput;
    use crate::storage::{JobStore, MemoryStore};
    use chrono::{TimeZone, Utc};

    fn job(id: &str, title: &str, day: u32) -> Job {
        Job {
            source: "reed".to_string(),
            source_job_id: id.to_string(),
            title: title.to_string(),
            company: None,
            location: None,
            url: None,
            posted_at: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
        }
    }

    async fn setup() -> (Arc<MemoryStore>, SeenTracker) {
        let store = Arc::new(MemoryStore::new());
        let registry = SearchRegistry::new(store.clone());
        let mut input = SavedSearchInput::named("go");
        input.q = Some("go".to_string());
        registry.upsert(input).await.expect("upsert");
        (store.clone(), SeenTracker::new(store, registry))
    }

    #[tokio::test]
    async fn test_second_call_reports_nothing() {
        let (store, tracker) = setup().await;
        store
            .upsert_many(&[job("1", "Go Dev", 1), job("2", "Go Lead", 2)])
            .await
            .expect("upsert");

        let (_, first) = tracker.compute_new_and_mark("go").await.expect("first");
        let ids: Vec<&str> = first.iter().map(|j| j.source_job_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);

        let (_, second) = tracker.compute_new_and_mark("go").await.expect("second");
        assert!(second.is_empty());
        assert_eq!(tracker.count_seen("go").await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_only_later_arrivals_are_new() {
        let (store, tracker) = setup().await;
        store.upsert_many(&[job("1", "Go Dev", 1)]).await.expect("upsert");
        tracker.compute_new_and_mark("go").await.expect("first");

        store.upsert_many(&[job("3", "Go SRE", 3)]).await.expect("upsert");
        let (_, fresh) = tracker.compute_new_and_mark("go").await.expect("second");
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].uid(), "reed:3");
    }

    #[tokio::test]
    async fn test_preview_does_not_mark() {
        let (store, tracker) = setup().await;
        store.upsert_many(&[job("1", "Go Dev", 1)]).await.expect("upsert");
        let (_, jobs) = tracker.preview("go").await.expect("preview");
        assert_eq!(jobs.len(), 1);
        assert_eq!(tracker.count_seen("go").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_feed_flags_reported_jobs() {
        let (store, tracker) = setup().await;
        store.upsert_many(&[job("1", "Go Dev", 1)]).await.expect("upsert");
        tracker.compute_new_and_mark("go").await.expect("mark");
        store.upsert_many(&[job("2", "Go Lead", 2)]).await.expect("upsert");

        let (_, entries) = tracker.feed("go", None).await.expect("feed");
        let flags: Vec<(String, bool)> = entries.iter().map(|(j, s)| (j.uid(), *s)).collect();
        assert_eq!(
            flags,
            vec![("reed:2".to_string(), false), ("reed:1".to_string(), true)]
        );

        let (_, limited) = tracker.feed("go", Some(1)).await.expect("feed");
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_new_count_does_not_mark() {
        let (store, tracker) = setup().await;
        store
            .upsert_many(&[job("1", "Go Dev", 1), job("2", "Go Lead", 2)])
            .await
            .expect("upsert");

        let (_, count) = tracker.new_count("go", None).await.expect("count");
        assert_eq!(count, 2);
        let (_, again) = tracker.new_count("go", None).await.expect("count");
        assert_eq!(again, 2);
        assert_eq!(tracker.count_seen("go").await.expect("count"), 0);

        tracker.compute_new_and_mark("go").await.expect("mark");
        let (_, after) = tracker.new_count("go", None).await.expect("count");
        assert_eq!(after, 0);
    }

    #[tokio::test]
    async fn test_unknown_search_is_not_found() {
        let (_, tracker) = setup().await;
        let err = tracker.compute_new_and_mark("nope").await.unwrap_err();
        assert!(matches!(err, CollectorError::NotFound(_)));
        let err = tracker.feed("nope", None).await.unwrap_err();
        assert!(matches!(err, CollectorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_calls_never_share_a_job() {
        let (store, tracker) = setup().await;
        let jobs: Vec<Job> = (1..=20).map(|i| job(&i.to_string(), "Go Dev", 1)).collect();
        store.upsert_many(&jobs).await.expect("upsert");

        let a = tokio::spawn({
            let t = tracker.clone();
            async move { t.compute_new_and_mark("go").await }
        });
        let b = tokio::spawn({
            let t = tracker.clone();
            async move { t.compute_new_and_mark("go").await }
        });
        let (_, left) = a.await.expect("join").expect("left");
        let (_, right) = b.await.expect("join").expect("right");

        assert_eq!(left.len() + right.len(), 20);
        for j in &left {
            assert!(!right.iter().any(|r| r.uid() == j.uid()));
        }
    }
}
