use std::sync::Arc;

use chrono::Utc;

use crate::errors::CollectorError;
use crate::models::search::validate_saved_search;
use crate::models::{SavedSearch, SavedSearchInput, SavedSearchView};
use crate::storage::Store;

/// Create, look up and list saved searches.
#[derive(Clone)]
pub struct SearchRegistry {
    store: Arc<dyn Store>,
}

impl SearchRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate `input` and create or replace the search with that name.
    /// The seen set for the name is untouched.
    pub async fn upsert(&self, input: SavedSearchInput) -> Result<SavedSearch, CollectorError> {
        let saved = validate_saved_search(input)?.into_saved(Utc::now());
        self.store.upsert_search(&saved).await?;
        tracing::info!("Saved search '{}' upserted", saved.name);
        Ok(saved)
    }

    pub async fn get(&self, name: &str) -> Result<Option<SavedSearch>, CollectorError> {
        self.store.get_search(name).await
    }

    pub async fn require(&self, name: &str) -> Result<SavedSearch, CollectorError> {
        self.get(name)
            .await?
            .ok_or_else(|| CollectorError::NotFound(format!("Saved search '{}' not found", name)))
    }

    pub async fn list(&self) -> Result<Vec<SavedSearch>, CollectorError> {
        self.store.list_searches().await
    }

    pub async fn view(&self, search: SavedSearch) -> Result<SavedSearchView, CollectorError> {
        let seen_count = self.store.count_seen(&search.name).await?;
        Ok(SavedSearchView { search, seen_count })
    }

    pub async fn list_views(&self) -> Result<Vec<SavedSearchView>, CollectorError> {
        let mut views = Vec::new();
        for search in self.list().await? {
            views.push(self.view(search).await?);
        }
        Ok(views)
    }
}
