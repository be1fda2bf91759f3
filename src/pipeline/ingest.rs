use std::sync::Arc;

use crate::errors::CollectorError;
use crate::models::{IngestSummary, SourceIngest};
use crate::sources::{JobSource, SourceQuery};
use crate::storage::Store;

/// Pulls from the configured providers into the job store.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    sources: Vec<Arc<dyn JobSource>>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, sources: Vec<Arc<dyn JobSource>>) -> Self {
        Self { store, sources }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Ingest from every provider in order. The first fetch failure aborts
    /// the run; providers already ingested keep their upserts.
    pub async fn ingest_all(&self, query: &SourceQuery) -> Result<IngestSummary, CollectorError> {
        let mut summary = IngestSummary::default();
        for source in &self.sources {
            let result = self.ingest_source(source.as_ref(), query).await?;
            summary.sources.insert(source.name().to_string(), result);
        }
        summary.total_in_store = self.store.count().await?;
        Ok(summary)
    }

    pub async fn ingest_one(
        &self,
        name: &str,
        query: &SourceQuery,
    ) -> Result<IngestSummary, CollectorError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                CollectorError::NotFound(format!("Source '{}' is not configured", name))
            })?;

        let mut summary = IngestSummary::default();
        let result = self.ingest_source(source.as_ref(), query).await?;
        summary.sources.insert(source.name().to_string(), result);
        summary.total_in_store = self.store.count().await?;
        Ok(summary)
    }

    async fn ingest_source(
        &self,
        source: &dyn JobSource,
        query: &SourceQuery,
    ) -> Result<SourceIngest, CollectorError> {
        let jobs = source.fetch(query).await?;
        let affected = self.store.upsert_many(&jobs).await?;
        tracing::info!(
            "Ingested {} jobs from {} ({} changed)",
            jobs.len(),
            source.name(),
            affected
        );
        Ok(SourceIngest {
            fetched: jobs.len(),
            affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Job;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    struct StaticSource {
        name: &'static str,
        ids: Vec<&'static str>,
    }

    #[async_trait]
    impl JobSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Job>, CollectorError> {
            Ok(self
                .ids
                .iter()
                .map(|id| Job {
                    source: self.name.to_string(),
                    source_job_id: id.to_string(),
                    title: format!("{} role", query.keywords),
                    company: None,
                    location: query.location.clone(),
                    url: None,
                    posted_at: None,
                })
                .collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl JobSource for FailingSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _query: &SourceQuery) -> Result<Vec<Job>, CollectorError> {
            Err(CollectorError::UpstreamAuth("broken auth failed (401)".to_string()))
        }
    }

    fn ingestor(sources: Vec<Arc<dyn JobSource>>) -> Ingestor {
        Ingestor::new(Arc::new(MemoryStore::new()), sources)
    }

    #[tokio::test]
    async fn test_ingest_all_reports_per_source() {
        let ing = ingestor(vec![
            Arc::new(StaticSource {
                name: "reed",
                ids: vec!["1", "2"],
            }),
            Arc::new(StaticSource {
                name: "adzuna",
                ids: vec!["1"],
            }),
        ]);
        let query = SourceQuery::new("rust", None);

        let summary = ing.ingest_all(&query).await.expect("ingest");
        assert_eq!(summary.sources["reed"].fetched, 2);
        assert_eq!(summary.sources["adzuna"].affected, 1);
        assert_eq!(summary.total_in_store, 3);

        let again = ing.ingest_all(&query).await.expect("ingest");
        assert_eq!(again.sources["reed"].affected, 0);
        assert_eq!(again.total_in_store, 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts() {
        let ing = ingestor(vec![Arc::new(FailingSource)]);
        let err = ing
            .ingest_all(&SourceQuery::new("rust", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::UpstreamAuth(_)));
    }

    #[tokio::test]
    async fn test_ingest_one_selects_by_name() {
        let ing = ingestor(vec![
            Arc::new(StaticSource {
                name: "reed",
                ids: vec!["1"],
            }),
            Arc::new(FailingSource),
        ]);
        let summary = ing
            .ingest_one("REED", &SourceQuery::new("go", None))
            .await
            .expect("ingest");
        assert_eq!(summary.sources.len(), 1);
        assert_eq!(ing.source_names(), vec!["reed", "broken"]);

        let err = ing
            .ingest_one("indeed", &SourceQuery::new("go", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::NotFound(_)));
    }
}
