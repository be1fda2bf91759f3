pub mod memory;
pub mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::CollectorError;
use crate::models::{Job, JobFilter, SavedSearch};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Canonical job records keyed by uid.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert-or-replace every job; returns how many records changed state
    /// (new uids plus existing uids whose fields differ).
    async fn upsert_many(&self, jobs: &[Job]) -> Result<usize, CollectorError>;
    /// Jobs by `posted_at` desc (nulls last), then newest insertion first.
    async fn list(&self, limit: usize) -> Result<Vec<Job>, CollectorError>;
    /// Jobs matching `filter`, in `list` order, truncated to `limit`.
    async fn search(&self, filter: &JobFilter, limit: usize) -> Result<Vec<Job>, CollectorError>;
    async fn count(&self) -> Result<usize, CollectorError>;
}

/// Saved searches keyed by name.
#[async_trait]
pub trait SavedSearchStore: Send + Sync {
    /// Create or replace the filter fields of `search.name`.
    async fn upsert_search(&self, search: &SavedSearch) -> Result<(), CollectorError>;
    async fn get_search(&self, name: &str) -> Result<Option<SavedSearch>, CollectorError>;
    /// All searches, name ascending.
    async fn list_searches(&self) -> Result<Vec<SavedSearch>, CollectorError>;
}

/// Per-search record of job uids already reported.
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn count_seen(&self, search_name: &str) -> Result<usize, CollectorError>;
    /// Insert-or-ignore each `(search_name, uid)` pair and return the uids
    /// whose pair was actually inserted by this call, in input order.
    async fn mark_seen(
        &self,
        search_name: &str,
        uids: &[String],
    ) -> Result<Vec<String>, CollectorError>;
    /// Which of `uids` are already recorded for `search_name`. Read only.
    async fn seen_among(
        &self,
        search_name: &str,
        uids: &[String],
    ) -> Result<HashSet<String>, CollectorError>;
}

/// Everything the pipeline needs from one persistence backend.
pub trait Store: JobStore + SavedSearchStore + SeenStore {}

impl<T: JobStore + SavedSearchStore + SeenStore> Store for T {}
