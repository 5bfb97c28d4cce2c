use std::time::Duration;

use housia_core::AppError;
use housia_core::models::ScrapedListing;
use housia_core::traits::ScrapeDelegate;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::config::DelegateConfig;

/// Longest slice of an error response kept in a `ScrapeError`; the message
/// ends up in the job's status record.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Scrape delegate that forwards `(url, prompt)` to an extraction service.
///
/// The service visits the page, runs the prompt and answers with a
/// listing as JSON. Every failure, timeouts included, is a
/// [`AppError::ScrapeError`] so the worker can spend its retry budget on it.
#[derive(Clone)]
pub struct HttpScrapeDelegate {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    prompt: &'a str,
}

impl HttpScrapeDelegate {
    pub fn new(config: &DelegateConfig) -> Result<Self, AppError> {
        let endpoint = Url::parse(&config.url)
            .map_err(|e| AppError::ConfigError(format!("Invalid SCRAPER_URL '{}': {e}", config.url)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout: config.timeout,
        })
    }
}

impl ScrapeDelegate for HttpScrapeDelegate {
    async fn scrape(&self, url: &str, prompt: &str) -> Result<ScrapedListing, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ScrapeRequest { url, prompt })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::ScrapeError(format!(
                        "Scrape of {url} timed out after {:?}",
                        self.timeout
                    ))
                } else if e.is_connect() {
                    AppError::ScrapeError(format!("Scraper unreachable: {e}"))
                } else {
                    AppError::ScrapeError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ScrapeError(format!(
                "Scraper answered HTTP {}: {}",
                status.as_u16(),
                truncate(&body, MAX_ERROR_BODY_CHARS)
            )));
        }

        response
            .json::<ScrapedListing>()
            .await
            .map_err(|e| AppError::ScrapeError(format!("Scraper returned an invalid listing: {e}")))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
