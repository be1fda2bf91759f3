pub mod config;
pub mod filter;
pub mod job;
pub mod search;
pub mod summary;

pub use config::{CollectorConfig, MailProvider, StorageBackend};
pub use filter::{JobFilter, SearchParams};
pub use job::{make_uid, Job, JobView};
pub use search::{SavedSearch, SavedSearchInput, SavedSearchView};
pub use summary::{IngestSummary, RunAllSummary, SourceIngest, SweepSummary};
