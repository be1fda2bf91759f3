use std::fmt::Write as _;
use std::sync::Arc;

use crate::errors::CollectorError;
use crate::mailer::Mailer;
use crate::models::{Job, RunAllSummary, SweepSummary};
use crate::pipeline::{Ingestor, SearchRegistry, SeenTracker};
use crate::sources::SourceQuery;

pub const TEST_EMAIL_SUBJECT: &str = "[JobCollector] Email test";

pub fn digest_subject(name: &str, count: usize) -> String {
    format!("[JobCollector] {} new jobs for {}", count, name)
}

/// Plain-text digest body for the jobs newly found by `name`.
pub fn format_digest(name: &str, jobs: &[Job]) -> String {
    let mut out = format!("New jobs for: {}\n\n", name);
    for job in jobs {
        let _ = writeln!(
            out,
            "- {} | {} | {}",
            job.title,
            job.company.as_deref().unwrap_or("Unknown"),
            job.location.as_deref().unwrap_or("")
        );
        if let Some(ref url) = job.url {
            let _ = writeln!(out, "  {}", url);
        }
        out.push('\n');
    }
    out
}

/// Runs sweeps: ingest, compute new jobs, mail a digest.
#[derive(Clone)]
pub struct Notifier {
    registry: SearchRegistry,
    tracker: SeenTracker,
    ingestor: Ingestor,
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(
        registry: SearchRegistry,
        tracker: SeenTracker,
        ingestor: Ingestor,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            registry,
            tracker,
            ingestor,
            mailer,
        }
    }

    /// Sweep a single saved search.
    ///
    /// New jobs are marked before the digest is sent, so a failed send is
    /// not retried on the next sweep.
    pub async fn run_one(&self, name: &str) -> Result<SweepSummary, CollectorError> {
        let search = self.registry.require(name).await?;

        let query = SourceQuery::new(search.q.as_deref().unwrap_or(""), search.location.as_deref());
        let ingest = self.ingestor.ingest_all(&query).await?;

        let (search, fresh) = self.tracker.compute_new_and_mark(&search.name).await?;
        let mut summary = SweepSummary {
            name: search.name.clone(),
            ingested: ingest.fetched_by_source(),
            new_count: fresh.len(),
            ..Default::default()
        };

        if !fresh.is_empty() {
            let subject = digest_subject(&search.name, fresh.len());
            let body = format_digest(&search.name, &fresh);
            self.mailer.send(&subject, &body, None).await?;
            summary.emailed = true;
        }

        tracing::info!(
            "Sweep '{}': {} new, emailed={}",
            summary.name,
            summary.new_count,
            summary.emailed
        );
        Ok(summary)
    }

    /// Sweep every saved search in name order. A failing search is reported
    /// in its own entry and the batch continues.
    pub async fn run_all(&self) -> Result<RunAllSummary, CollectorError> {
        let searches = self.registry.list().await?;
        let mut summary = RunAllSummary::default();

        for search in searches {
            summary.ran += 1;
            match self.run_one(&search.name).await {
                Ok(result) => summary.results.push(result),
                Err(e) => {
                    tracing::warn!("Sweep '{}' failed: {}", search.name, e);
                    summary.failed += 1;
                    summary.results.push(SweepSummary {
                        name: search.name,
                        error: Some(e.to_string()),
                        error_kind: Some(e.code().to_string()),
                        ..Default::default()
                    });
                }
            }
        }

        Ok(summary)
    }

    pub async fn send_test_email(&self) -> Result<(), CollectorError> {
        self.mailer
            .send(
                TEST_EMAIL_SUBJECT,
                "This is a test email from JobCollector.",
                Some("<p>This is a test email from <strong>JobCollector</strong>.</p>"),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SavedSearchInput;
    use crate::sources::JobSource;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            subject: &str,
            text: &str,
            _html: Option<&str>,
        ) -> Result<(), CollectorError> {
            if self.fail {
                return Err(CollectorError::Notification("smtp down".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Returns one job whose title echoes the query keywords.
    struct EchoSource;

    #[async_trait]
    impl JobSource for EchoSource {
        fn name(&self) -> &str {
            "reed"
        }

        async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Job>, CollectorError> {
            if query.keywords == "explode" {
                return Err(CollectorError::Upstream("reed error 500: boom".to_string()));
            }
            Ok(vec![Job {
                source: "reed".to_string(),
                source_job_id: query.keywords.clone(),
                title: format!("{} engineer", query.keywords),
                company: Some("Acme".to_string()),
                location: query.location.clone(),
                url: Some(format!("https://example.com/{}", query.keywords)),
                posted_at: None,
            }])
        }
    }

    async fn notifier(mailer: Arc<RecordingMailer>, searches: &[&str]) -> Notifier {
        let store = Arc::new(MemoryStore::new());
        let registry = SearchRegistry::new(store.clone());
        for name in searches {
            let mut input = SavedSearchInput::named(name);
            input.q = Some(name.to_string());
            registry.upsert(input).await.expect("upsert");
        }
        let tracker = SeenTracker::new(store.clone(), registry.clone());
        let ingestor = Ingestor::new(store, vec![Arc::new(EchoSource)]);
        Notifier::new(registry, tracker, ingestor, mailer)
    }

    fn job(title: &str, company: Option<&str>, location: Option<&str>, url: Option<&str>) -> Job {
        Job {
            source: "reed".to_string(),
            source_job_id: "1".to_string(),
            title: title.to_string(),
            company: company.map(String::from),
            location: location.map(String::from),
            url: url.map(String::from),
            posted_at: None,
        }
    }

    #[test]
    fn test_format_digest() {
        let jobs = vec![
            job("Go Dev", Some("Acme"), Some("London"), Some("https://x/1")),
            job("Rust Dev", None, None, None),
        ];
        let digest = format_digest("go", &jobs);
        assert_eq!(
            digest,
            "New jobs for: go\n\n\
             - Go Dev | Acme | London\n  https://x/1\n\n\
             - Rust Dev | Unknown | \n\n"
        );
    }

    #[test]
    fn test_digest_subject() {
        assert_eq!(digest_subject("go", 3), "[JobCollector] 3 new jobs for go");
    }

    #[tokio::test]
    async fn test_run_one_emails_then_goes_quiet() {
        let mailer = Arc::new(RecordingMailer::default());
        let n = notifier(mailer.clone(), &["golang"]).await;

        let first = n.run_one("golang").await.expect("first");
        assert_eq!(first.new_count, 1);
        assert!(first.emailed);
        assert_eq!(first.ingested.get("reed"), Some(&1));

        let second = n.run_one("golang").await.expect("second");
        assert_eq!(second.new_count, 0);
        assert!(!second.emailed);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "[JobCollector] 1 new jobs for golang");
        assert!(sent[0].1.contains("- golang engineer | Acme | "));
    }

    #[tokio::test]
    async fn test_run_one_unknown_search_is_not_found() {
        let n = notifier(Arc::new(RecordingMailer::default()), &[]).await;
        assert!(matches!(
            n.run_one("ghost").await,
            Err(CollectorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mail_failure_propagates_and_still_marks() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let n = notifier(mailer, &["golang"]).await;

        let err = n.run_one("golang").await.unwrap_err();
        assert!(matches!(err, CollectorError::Notification(_)));

        assert_eq!(n.tracker.count_seen("golang").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_run_all_isolates_failures() {
        let mailer = Arc::new(RecordingMailer::default());
        let n = notifier(mailer.clone(), &["explode", "alpha", "rust"]).await;

        let summary = n.run_all().await.expect("run all");
        assert_eq!(summary.ran, 3);
        assert_eq!(summary.failed, 1);

        let names: Vec<&str> = summary.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "explode", "rust"]);

        let failed = &summary.results[1];
        assert_eq!(failed.error_kind.as_deref(), Some("upstream_error"));
        assert!(failed.error.as_deref().unwrap_or("").contains("boom"));
        assert!(summary.results[0].emailed);
        assert!(summary.results[2].emailed);
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_send_test_email_subject() {
        let mailer = Arc::new(RecordingMailer::default());
        let n = notifier(mailer.clone(), &[]).await;
        n.send_test_email().await.expect("send");
        assert_eq!(mailer.sent.lock().unwrap()[0].0, TEST_EMAIL_SUBJECT);
    }
}
