use std::str::FromStr;

use uuid::Uuid;

use crate::error::AppError;

/// Name of the durable queue carrying scrape jobs.
pub const DEFAULT_QUEUE: &str = "scraping_queue";

/// Default number of jobs a worker processes at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default retry budget given to new jobs.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Read a required environment variable.
pub fn require_env(name: &str) -> Result<String, AppError> {
    std::env::var(name).map_err(|_| AppError::ConfigError(format!("{name} not set")))
}

/// Read and parse an optional environment variable, falling back to `default`.
pub fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(format!("Invalid {name} '{raw}'"))),
    }
}

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    /// Prefetch limit and upper bound on jobs in flight.
    pub concurrency: usize,
    pub queue: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", &Uuid::new_v4().simple().to_string()[..8]),
            concurrency: DEFAULT_CONCURRENCY,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

impl WorkerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `HOUSIA_CONCURRENCY` (optional, defaults to 3, must be at least 1)
    /// - `HOUSIA_QUEUE` (optional, defaults to `scraping_queue`)
    pub fn from_env() -> Result<Self, AppError> {
        let config = Self::default()
            .with_concurrency(env_or("HOUSIA_CONCURRENCY", DEFAULT_CONCURRENCY)?)
            .with_queue(env_or("HOUSIA_QUEUE", DEFAULT_QUEUE.to_string())?);
        config.validate()?;
        Ok(config)
    }

    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 {
            return Err(AppError::ConfigError(
                "worker concurrency must be at least 1".into(),
            ));
        }
        if self.concurrency > u16::MAX as usize {
            return Err(AppError::ConfigError(format!(
                "worker concurrency must not exceed {}",
                u16::MAX
            )));
        }
        Ok(())
    }
}

/// Configuration for the submission gateway.
#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    pub queue: String,
    pub max_retries: u32,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl SubmissionConfig {
    /// Read configuration from environment variables.
    ///
    /// - `HOUSIA_MAX_RETRIES` (optional, defaults to 3)
    /// - `HOUSIA_QUEUE` (optional, defaults to `scraping_queue`)
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            queue: env_or("HOUSIA_QUEUE", DEFAULT_QUEUE.to_string())?,
            max_retries: env_or("HOUSIA_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
        })
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }
}
