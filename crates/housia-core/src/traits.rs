use std::future::Future;

use tokio::sync::mpsc;

use crate::error::AppError;
use crate::job::JobStatusRecord;
use crate::models::{Listing, NewListing, ScrapedListing};

/// A message handed out by the broker, identified by its delivery tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
    /// Set by the broker when this message was delivered before and not acked.
    pub redelivered: bool,
}

/// Stream of deliveries from one consumer. A `ConnectionError` item means
/// the consumer is gone.
pub type Deliveries = mpsc::Receiver<Result<Delivery, AppError>>;

/// Durable message broker connection.
///
/// Implementations own one connection and one channel and must serialize
/// every channel operation, since handles are cloned into concurrently
/// running job handlers.
pub trait Broker: Send + Sync + Clone + 'static {
    /// Publish a persistent message to a durable queue.
    fn publish(
        &self,
        queue: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Start consuming `queue` with at most `prefetch` unacked deliveries.
    fn consume(
        &self,
        queue: &str,
        prefetch: u16,
    ) -> impl Future<Output = Result<Deliveries, AppError>> + Send;

    fn ack(&self, tag: u64) -> impl Future<Output = Result<(), AppError>> + Send;

    fn nack(&self, tag: u64, requeue: bool) -> impl Future<Output = Result<(), AppError>> + Send;

    fn close(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Key-value mirror of job progress, keyed by job id.
///
/// Both writes are atomic check-and-set operations: a gateway and several
/// handlers may write the same job concurrently.
pub trait StatusStore: Send + Sync + Clone + 'static {
    fn get(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<Option<JobStatusRecord>, AppError>> + Send;

    /// Store `record` only if the job has no record yet. Returns whether it was stored.
    fn set_if_absent(
        &self,
        record: &JobStatusRecord,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Store `record` unless the stored status refuses the move
    /// (see [`JobStatus::can_transition_to`](crate::job::JobStatus::can_transition_to)).
    /// Returns whether it was stored.
    fn advance(
        &self,
        record: &JobStatusRecord,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// Visits a listing page and extracts a structured record.
///
/// Timeouts are the delegate's own business; every failure surfaces as
/// [`AppError::ScrapeError`].
pub trait ScrapeDelegate: Send + Sync + Clone + 'static {
    fn scrape(
        &self,
        url: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<ScrapedListing, AppError>> + Send;
}

/// Supplies the extraction prompt currently marked active.
pub trait PromptSource: Send + Sync + Clone + 'static {
    fn active_prompt(&self) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Durable listing storage, unique by url.
pub trait ListingStore: Send + Sync + Clone + 'static {
    fn find_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<Listing>, AppError>> + Send;

    /// Atomic create-or-conflict. A taken url is [`AppError::DuplicateError`].
    fn create(
        &self,
        listing: &NewListing,
    ) -> impl Future<Output = Result<Listing, AppError>> + Send;
}
