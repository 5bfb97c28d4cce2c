use std::time::Duration;

use housia_core::AppError;
use housia_core::config::{DEFAULT_QUEUE, env_or, require_env};

const DEFAULT_SCRAPER_TIMEOUT_SECS: u64 = 300;

/// Connection settings for the RabbitMQ broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
    /// Queue declared durable on connect.
    pub queue: String,
}

impl BrokerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: DEFAULT_QUEUE.to_string(),
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Read configuration from environment variables.
    ///
    /// - `RABBITMQ_URL` (required)
    /// - `HOUSIA_QUEUE` (optional, defaults to `scraping_queue`)
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            url: require_env("RABBITMQ_URL")?,
            queue: env_or("HOUSIA_QUEUE", DEFAULT_QUEUE.to_string())?,
        })
    }
}

/// Connection settings for the Redis status store.
#[derive(Debug, Clone)]
pub struct StatusStoreConfig {
    pub url: String,
}

impl StatusStoreConfig {
    /// - `REDIS_URL` (required)
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            url: require_env("REDIS_URL")?,
        })
    }
}

/// Settings for the HTTP scrape delegate.
#[derive(Debug, Clone)]
pub struct DelegateConfig {
    /// Endpoint receiving `{url, prompt}` and answering with a listing.
    pub url: String,
    pub timeout: Duration,
}

impl DelegateConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(DEFAULT_SCRAPER_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read configuration from environment variables.
    ///
    /// - `SCRAPER_URL` (required)
    /// - `SCRAPER_TIMEOUT_SECS` (optional, defaults to 300)
    pub fn from_env() -> Result<Self, AppError> {
        let secs = env_or("SCRAPER_TIMEOUT_SECS", DEFAULT_SCRAPER_TIMEOUT_SECS)?;
        if secs == 0 {
            return Err(AppError::ConfigError(
                "SCRAPER_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        Ok(Self::new(require_env("SCRAPER_URL")?).with_timeout(Duration::from_secs(secs)))
    }
}
