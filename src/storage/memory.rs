use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::CollectorError;
use crate::models::filter::listing_order;
use crate::models::{Job, JobFilter, SavedSearch};
use crate::storage::{JobStore, SavedSearchStore, SeenStore};

struct StoredJob {
    job: Job,
    /// First-insertion order; kept across replacements.
    seq: u64,
}

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<String, StoredJob>,
    next_seq: u64,
    searches: BTreeMap<String, SavedSearch>,
    seen: HashMap<String, HashMap<String, DateTime<Utc>>>,
}

/// In-process backend. One lock covers all state, and every
/// read-modify-write sequence holds the write half for its full duration.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ordered(state: &MemoryState, filter: Option<&JobFilter>, limit: usize) -> Vec<Job> {
    let mut hits: Vec<&StoredJob> = state
        .jobs
        .values()
        .filter(|s| filter.map(|f| f.matches(&s.job)).unwrap_or(true))
        .collect();
    hits.sort_by(|a, b| listing_order(a.job.posted_at, a.seq, b.job.posted_at, b.seq));
    hits.into_iter().take(limit).map(|s| s.job.clone()).collect()
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn upsert_many(&self, jobs: &[Job]) -> Result<usize, CollectorError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut changed = 0;

        for incoming in jobs {
            let job = incoming.stored();
            let seq = state.next_seq;
            match state.jobs.entry(job.uid()) {
                Entry::Occupied(mut entry) => {
                    let stored = entry.get_mut();
                    if stored.job != job {
                        stored.job = job;
                        changed += 1;
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(StoredJob { job, seq });
                    state.next_seq += 1;
                    changed += 1;
                }
            }
        }

        Ok(changed)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Job>, CollectorError> {
        let state = self.state.read().await;
        Ok(ordered(&state, None, limit))
    }

    async fn search(&self, filter: &JobFilter, limit: usize) -> Result<Vec<Job>, CollectorError> {
        let state = self.state.read().await;
        Ok(ordered(&state, Some(filter), limit))
    }

    async fn count(&self) -> Result<usize, CollectorError> {
        Ok(self.state.read().await.jobs.len())
    }
}

#[async_trait]
impl SavedSearchStore for MemoryStore {
    async fn upsert_search(&self, search: &SavedSearch) -> Result<(), CollectorError> {
        let mut state = self.state.write().await;
        state.searches.insert(search.name.clone(), search.clone());
        Ok(())
    }

    async fn get_search(&self, name: &str) -> Result<Option<SavedSearch>, CollectorError> {
        Ok(self.state.read().await.searches.get(name).cloned())
    }

    async fn list_searches(&self) -> Result<Vec<SavedSearch>, CollectorError> {
        Ok(self.state.read().await.searches.values().cloned().collect())
    }
}

#[async_trait]
impl SeenStore for MemoryStore {
    async fn count_seen(&self, search_name: &str) -> Result<usize, CollectorError> {
        let state = self.state.read().await;
        Ok(state.seen.get(search_name).map(HashMap::len).unwrap_or(0))
    }

    async fn mark_seen(
        &self,
        search_name: &str,
        uids: &[String],
    ) -> Result<Vec<String>, CollectorError> {
        let mut state = self.state.write().await;
        let seen = state.seen.entry(search_name.to_string()).or_default();
        let now = Utc::now();

        let mut inserted = Vec::new();
        for uid in uids {
            if let Entry::Vacant(entry) = seen.entry(uid.clone()) {
                entry.insert(now);
                inserted.push(uid.clone());
            }
        }
        Ok(inserted)
    }

    async fn seen_among(
        &self,
        search_name: &str,
        uids: &[String],
    ) -> Result<HashSet<String>, CollectorError> {
        let state = self.state.read().await;
        let Some(seen) = state.seen.get(search_name) else {
            return Ok(HashSet::new());
        };
        Ok(uids
            .iter()
            .filter(|uid| seen.contains_key(uid.as_str()))
            .cloned()
            .collect())
    }
}
