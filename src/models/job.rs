use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Build the dedupe key for a posting: `source:source_job_id`.
pub fn make_uid(source: &str, source_job_id: &str) -> String {
    format!("{}:{}", source, source_job_id)
}

/// Canonical job posting, independent of which provider it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub source: String,
    pub source_job_id: String,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn uid(&self) -> String {
        make_uid(&self.source, &self.source_job_id)
    }

    /// The job as every store keeps it: `posted_at` cut to whole
    /// microseconds.
    pub fn stored(&self) -> Job {
        let mut job = self.clone();
        job.posted_at = job.posted_at.map(|d| d.trunc_subsecs(6));
        job
    }
}

/// Outward representation of a job, carrying its uid alongside the fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobView {
    pub uid: String,
    #[serde(flatten)]
    pub job: Job,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            uid: job.uid(),
            job,
        }
    }
}
