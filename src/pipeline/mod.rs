pub mod ingest;
pub mod notify;
pub mod registry;
pub mod tracker;

pub use ingest::Ingestor;
pub use notify::{format_digest, Notifier};
pub use registry::SearchRegistry;
pub use tracker::SeenTracker;
