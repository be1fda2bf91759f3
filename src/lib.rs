pub mod cli;
pub mod daemon;
pub mod errors;
pub mod mailer;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod sources;
pub mod storage;

pub use errors::CollectorError;
