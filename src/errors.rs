use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream auth error: {0}")]
    UpstreamAuth(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CollectorError {
    /// Stable machine-readable code used in API error bodies and summaries.
    pub fn code(&self) -> &'static str {
        match self {
            CollectorError::Validation(_) => "validation_error",
            CollectorError::NotFound(_) => "not_found",
            CollectorError::UpstreamAuth(_) => "upstream_auth_error",
            CollectorError::Upstream(_) => "upstream_error",
            CollectorError::Notification(_) => "notification_error",
            CollectorError::Storage(_) => "storage_error",
        }
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        CollectorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for CollectorError {
    fn from(err: rusqlite::Error) -> Self {
        CollectorError::Storage(err.to_string())
    }
}
