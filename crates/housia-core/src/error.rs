use thiserror::Error;

/// Application-wide error types for Housia.
///
/// Each variant maps to one failure class of the job pipeline so callers
/// can branch on retry / terminal / fatal without string matching.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed submission. Never enqueued.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The url is already stored. Never enqueued.
    #[error("Duplicate: {0} already exists")]
    DuplicateError(String),

    /// Broker or store unreachable. Fatal to the current process.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Scrape delegate timed out or failed to extract.
    #[error("Scrape error: {0}")]
    ScrapeError(String),

    /// Store write failed after a successful scrape.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Queue payload could not be parsed into a job.
    #[error("Poison message: {0}")]
    PoisonMessageError(String),

    /// Job status store read/write failed.
    #[error("Status store error: {0}")]
    StatusStoreError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if the failed attempt may be retried against the job's budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ScrapeError(_))
    }

    /// Returns true if the owning process should stop and be restarted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConnectionError(_))
    }
}
