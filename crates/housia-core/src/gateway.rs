use url::Url;

use crate::config::SubmissionConfig;
use crate::error::AppError;
use crate::job::{Job, JobDescriptor, JobStatus, JobStatusRecord};
use crate::status::StatusRecorder;
use crate::traits::{Broker, ListingStore, StatusStore};

const MIN_URL_LEN: usize = 10;

/// Accepts scrape requests and turns them into queued jobs.
///
/// The duplicate check against the listing store is only an optimization:
/// two concurrent submissions of a new url can both pass it, and the
/// store's unique constraint settles the race in the worker.
#[derive(Clone)]
pub struct SubmissionGateway<B, L, S>
where
    B: Broker,
    L: ListingStore,
    S: StatusStore,
{
    broker: B,
    listings: L,
    status: StatusRecorder<S>,
    config: SubmissionConfig,
}

impl<B, L, S> SubmissionGateway<B, L, S>
where
    B: Broker,
    L: ListingStore,
    S: StatusStore,
{
    pub fn new(broker: B, listings: L, status_store: S, config: SubmissionConfig) -> Self {
        Self {
            broker,
            listings,
            status: StatusRecorder::new(status_store),
            config,
        }
    }

    /// Submit a listing url for scraping.
    ///
    /// 1. Validate the url
    /// 2. Reject urls already stored
    /// 3. Publish a fresh job (authoritative step)
    /// 4. Seed `queued` in the status store (best effort)
    pub async fn submit(&self, url: &str) -> Result<JobDescriptor, AppError> {
        let url = validate_url(url)?;

        if self.listings.find_by_url(&url).await?.is_some() {
            tracing::warn!(%url, "Listing already exists, not enqueuing");
            return Err(AppError::DuplicateError(url));
        }

        let job = Job::new(url, self.config.max_retries);
        self.broker
            .publish(&self.config.queue, job.to_payload()?)
            .await?;

        self.status.seed(JobStatusRecord::queued(&job.id)).await;

        tracing::info!(job_id = %job.id, url = %job.url, "Job sent to queue");

        Ok(JobDescriptor {
            job_id: job.id,
            status: JobStatus::Queued,
        })
    }

    /// Last known status of a job, `None` when the id is unknown.
    pub async fn query_status(&self, job_id: &str) -> Result<Option<JobStatusRecord>, AppError> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(AppError::ValidationError("job id must not be empty".into()));
        }
        self.status.store().get(job_id).await
    }
}

/// Check that `raw` is an absolute http(s) url with a host.
pub fn validate_url(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    if raw.len() < MIN_URL_LEN {
        return Err(AppError::ValidationError(format!(
            "url must be at least {MIN_URL_LEN} characters"
        )));
    }

    let parsed =
        Url::parse(raw).map_err(|e| AppError::ValidationError(format!("invalid url: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::ValidationError(format!(
            "unsupported url scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(AppError::ValidationError("url has no host".into()));
    }

    Ok(raw.to_string())
}
