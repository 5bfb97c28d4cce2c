//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::DEFAULT_QUEUE;
use crate::error::AppError;
use crate::job::{Job, JobStatus, JobStatusRecord};
use crate::models::{Listing, NewListing, ScrapedListing};
use crate::traits::{
    Broker, Deliveries, Delivery, ListingStore, PromptSource, ScrapeDelegate, StatusStore,
};
use crate::worker::{FailureStage, WorkerEvent, WorkerReporter};

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

const CONSUMER_BUFFER: usize = 1024;

#[derive(Default)]
struct BrokerState {
    next_tag: u64,
    published: Vec<(String, Vec<u8>)>,
    backlog: HashMap<String, VecDeque<Delivery>>,
    consumers: HashMap<String, mpsc::Sender<Result<Delivery, AppError>>>,
    unacked: HashMap<u64, (String, Vec<u8>)>,
    acked: Vec<u64>,
    nacked: Vec<(u64, bool)>,
    consumed_with: Vec<(String, u16)>,
    publish_error: Option<AppError>,
    ack_error: Option<AppError>,
    closed: bool,
}

impl BrokerState {
    fn enqueue(&mut self, queue: &str, body: Vec<u8>, redelivered: bool) {
        self.next_tag += 1;
        let tag = self.next_tag;
        self.unacked.insert(tag, (queue.to_string(), body.clone()));

        let delivery = Delivery {
            tag,
            body,
            redelivered,
        };
        match self.consumers.get(queue) {
            Some(tx) => {
                let _ = tx.try_send(Ok(delivery));
            }
            None => self
                .backlog
                .entry(queue.to_string())
                .or_default()
                .push_back(delivery),
        }
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.closed {
            return Err(AppError::ConnectionError("broker is closed".into()));
        }
        Ok(())
    }
}

/// In-process broker: publishes are delivered to the queue's consumer,
/// or buffered until one attaches.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next publish with `error`.
    pub fn fail_next_publish(&self, error: AppError) {
        self.state.lock().unwrap().publish_error = Some(error);
    }

    /// Fail the next ack with `error`.
    pub fn fail_next_ack(&self, error: AppError) {
        self.state.lock().unwrap().ack_error = Some(error);
    }

    /// Publish a job as a producer would.
    pub fn push_job(&self, queue: &str, job: &Job) {
        self.inject(queue, job.to_payload().unwrap());
    }

    /// Publish raw bytes, bypassing any encoding.
    pub fn inject(&self, queue: &str, body: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.published.push((queue.to_string(), body.clone()));
        state.enqueue(queue, body, false);
    }

    /// Hand out a delivery directly, without going through a queue.
    pub fn delivery(&self, body: Vec<u8>) -> Delivery {
        let mut state = self.state.lock().unwrap();
        state.next_tag += 1;
        let tag = state.next_tag;
        state
            .unacked
            .insert(tag, (DEFAULT_QUEUE.to_string(), body.clone()));
        Delivery {
            tag,
            body,
            redelivered: false,
        }
    }

    /// Every decodable job published to `queue`, in publish order.
    pub fn published_jobs(&self, queue: &str) -> Vec<Job> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|(q, _)| q == queue)
            .filter_map(|(_, body)| Job::parse(body).ok())
            .collect()
    }

    /// Messages on `queue` not yet received by a consumer.
    pub fn pending(&self, queue: &str) -> usize {
        let state = self.state.lock().unwrap();
        let buffered = state.backlog.get(queue).map_or(0, VecDeque::len);
        let in_channel = state
            .consumers
            .get(queue)
            .map_or(0, |tx| tx.max_capacity() - tx.capacity());
        buffered + in_channel
    }

    pub fn acked(&self) -> Vec<u64> {
        self.state.lock().unwrap().acked.clone()
    }

    pub fn nacked(&self) -> Vec<(u64, bool)> {
        self.state.lock().unwrap().nacked.clone()
    }

    pub fn consumed_with(&self) -> Vec<(String, u16)> {
        self.state.lock().unwrap().consumed_with.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl Broker for MemoryBroker {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.ensure_open()?;
        if let Some(e) = state.publish_error.take() {
            return Err(e);
        }
        state.published.push((queue.to_string(), payload.clone()));
        state.enqueue(queue, payload, false);
        Ok(())
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<Deliveries, AppError> {
        let mut state = self.state.lock().unwrap();
        state.ensure_open()?;
        state.consumed_with.push((queue.to_string(), prefetch));

        let (tx, rx) = mpsc::channel(CONSUMER_BUFFER);
        for delivery in state.backlog.remove(queue).unwrap_or_default() {
            let _ = tx.try_send(Ok(delivery));
        }
        state.consumers.insert(queue.to_string(), tx);
        Ok(rx)
    }

    async fn ack(&self, tag: u64) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.ensure_open()?;
        if let Some(e) = state.ack_error.take() {
            return Err(e);
        }
        state.unacked.remove(&tag);
        state.acked.push(tag);
        Ok(())
    }

    async fn nack(&self, tag: u64, requeue: bool) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.ensure_open()?;
        state.nacked.push((tag, requeue));
        if let Some((queue, body)) = state.unacked.remove(&tag)
            && requeue
        {
            state.enqueue(&queue, body, true);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.consumers.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDelegate
// ---------------------------------------------------------------------------

/// Mock scrape delegate with scripted responses.
#[derive(Clone)]
pub struct MockDelegate {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default listing (or an error when failing).
    responses: Arc<Mutex<Vec<Result<ScrapedListing, AppError>>>>,
    always_fail: bool,
    delay: Duration,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockDelegate {
    fn build(responses: Vec<Result<ScrapedListing, AppError>>, always_fail: bool) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            always_fail,
            delay: Duration::ZERO,
            calls: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
        }
    }

    pub fn succeeding() -> Self {
        Self::build(Vec::new(), false)
    }

    pub fn failing() -> Self {
        Self::build(Vec::new(), true)
    }

    pub fn with_responses(responses: Vec<Result<ScrapedListing, AppError>>) -> Self {
        Self::build(responses, false)
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// `(url, prompt)` of every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ScrapeDelegate for MockDelegate {
    async fn scrape(&self, url: &str, prompt: &str) -> Result<ScrapedListing, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), prompt.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.always_fail {
            return Err(AppError::ScrapeError("extraction failed".into()));
        }
        let next = {
            let mut responses = self.responses.lock().unwrap();
            (!responses.is_empty()).then(|| responses.remove(0))
        };
        next.unwrap_or_else(|| Ok(make_scraped_listing()))
    }
}

// ---------------------------------------------------------------------------
// MockPromptSource
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockPromptSource {
    prompt: String,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockPromptSource {
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Fails once with `error`, then serves a default prompt.
    pub fn with_error(error: AppError) -> Self {
        Self {
            prompt: "default prompt".to_string(),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl PromptSource for MockPromptSource {
    async fn active_prompt(&self) -> Result<String, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.prompt.clone())
    }
}

// ---------------------------------------------------------------------------
// MockListingStore
// ---------------------------------------------------------------------------

/// Mock listing store that enforces url uniqueness in memory.
#[derive(Clone, Default)]
pub struct MockListingStore {
    listings: Arc<Mutex<Vec<Listing>>>,
    lookup_error: Arc<Mutex<Option<AppError>>>,
    create_error: Arc<Mutex<Option<AppError>>>,
}

impl MockListingStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_listing(listing: Listing) -> Self {
        let store = Self::default();
        store.listings.lock().unwrap().push(listing);
        store
    }

    /// Fails the next `find_by_url`.
    pub fn with_lookup_error(error: AppError) -> Self {
        let store = Self::default();
        *store.lookup_error.lock().unwrap() = Some(error);
        store
    }

    /// Fails the next `create`.
    pub fn with_create_error(error: AppError) -> Self {
        let store = Self::default();
        *store.create_error.lock().unwrap() = Some(error);
        store
    }

    pub fn listings(&self) -> Vec<Listing> {
        self.listings.lock().unwrap().clone()
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.url == url)
            .count()
    }
}

impl ListingStore for MockListingStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<Listing>, AppError> {
        if let Some(e) = self.lookup_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self
            .listings
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.url == url)
            .cloned())
    }

    async fn create(&self, listing: &NewListing) -> Result<Listing, AppError> {
        if let Some(e) = self.create_error.lock().unwrap().take() {
            return Err(e);
        }
        let mut listings = self.listings.lock().unwrap();
        if listings.iter().any(|l| l.url == listing.url) {
            return Err(AppError::DuplicateError(listing.url.clone()));
        }
        let stored = Listing {
            id: Uuid::new_v4(),
            name: listing.name.clone(),
            description: listing.description.clone(),
            price: listing.price,
            size: listing.size,
            city: listing.city.clone(),
            post_code: listing.post_code.clone(),
            rooms: listing.rooms,
            dpe: listing.dpe.clone(),
            url: listing.url.clone(),
            is_favorite: false,
            is_archived: false,
            is_housia_picked: false,
            is_user_picked: false,
            created_at: Utc::now(),
        };
        listings.push(stored.clone());
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// MockStatusStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StatusState {
    records: HashMap<String, JobStatusRecord>,
    history: Vec<JobStatusRecord>,
    processing: HashSet<String>,
    max_processing: usize,
}

/// Mock status store keeping every write in order.
#[derive(Clone, Default)]
pub struct MockStatusStore {
    state: Arc<Mutex<StatusState>>,
    /// When set, every call fails with a status store error.
    failure: Option<Arc<str>>,
    read_delay: Option<Duration>,
}

impl MockStatusStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing(error: AppError) -> Self {
        Self {
            state: Arc::default(),
            failure: Some(error.to_string().into()),
            read_delay: None,
        }
    }

    /// Handle on the same records whose reads answer after `delay`.
    pub fn with_read_delay(&self, delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..self.clone()
        }
    }

    /// Put a record in place without going through `set`.
    pub fn insert(&self, record: JobStatusRecord) {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(record.id.clone(), record);
    }

    pub fn record_of(&self, job_id: &str) -> Option<JobStatusRecord> {
        self.state.lock().unwrap().records.get(job_id).cloned()
    }

    pub fn status_of(&self, job_id: &str) -> Option<JobStatus> {
        self.record_of(job_id).map(|r| r.status)
    }

    /// Statuses written for `job_id`, oldest first.
    pub fn history_of(&self, job_id: &str) -> Vec<JobStatus> {
        self.state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|r| r.id == job_id)
            .map(|r| r.status)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().records.is_empty()
    }

    /// Highest number of jobs seen in `processing` at the same time.
    pub fn max_processing(&self) -> usize {
        self.state.lock().unwrap().max_processing
    }

    fn check(&self) -> Result<(), AppError> {
        match &self.failure {
            Some(message) => Err(AppError::StatusStoreError(message.to_string())),
            None => Ok(()),
        }
    }
}

impl StatusState {
    fn store(&mut self, record: &JobStatusRecord) {
        if record.status == JobStatus::Processing {
            self.processing.insert(record.id.clone());
        } else {
            self.processing.remove(&record.id);
        }
        self.max_processing = self.max_processing.max(self.processing.len());
        self.history.push(record.clone());
        self.records.insert(record.id.clone(), record.clone());
    }
}

impl StatusStore for MockStatusStore {
    async fn get(&self, job_id: &str) -> Result<Option<JobStatusRecord>, AppError> {
        self.check()?;
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.record_of(job_id))
    }

    async fn set_if_absent(&self, record: &JobStatusRecord) -> Result<bool, AppError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if state.records.contains_key(&record.id) {
            return Ok(false);
        }
        state.store(record);
        Ok(true)
    }

    async fn advance(&self, record: &JobStatusRecord) -> Result<bool, AppError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if let Some(current) = state.records.get(&record.id)
            && !current.status.can_transition_to(record.status)
        {
            return Ok(false);
        }
        state.store(record);
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock worker reporter that records events.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<Vec<FailureStage>>>,
    successes: Arc<Mutex<Vec<(String, u32)>>>,
    redeliveries: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<FailureStage> {
        self.failures.lock().unwrap().clone()
    }

    /// `(job_id, retry_count)` of every success.
    pub fn successes(&self) -> Vec<(String, u32)> {
        self.successes.lock().unwrap().clone()
    }

    /// Job ids of every message reported as redelivered.
    pub fn redeliveries(&self) -> Vec<String> {
        self.redeliveries.lock().unwrap().clone()
    }
}

impl WorkerReporter for MockReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let label = match &event {
            WorkerEvent::Started { .. } => "Started",
            WorkerEvent::PoisonMessage { .. } => "PoisonMessage",
            WorkerEvent::AlreadyResolved {
                job_id,
                redelivered,
                ..
            } => {
                if *redelivered {
                    self.redeliveries.lock().unwrap().push(job_id.to_string());
                }
                "AlreadyResolved"
            }
            WorkerEvent::JobStarted {
                job_id,
                redelivered,
                ..
            } => {
                if *redelivered {
                    self.redeliveries.lock().unwrap().push(job_id.to_string());
                }
                "JobStarted"
            }
            WorkerEvent::JobSucceeded {
                job_id,
                retry_count,
                ..
            } => {
                self.successes
                    .lock()
                    .unwrap()
                    .push((job_id.to_string(), *retry_count));
                "JobSucceeded"
            }
            WorkerEvent::JobRetrying { .. } => "JobRetrying",
            WorkerEvent::JobFailed { stage, .. } => {
                self.failures.lock().unwrap().push(*stage);
                "JobFailed"
            }
            WorkerEvent::Draining { .. } => "Draining",
            WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

pub fn make_test_job(url: &str, max_retries: u32) -> Job {
    Job::new(url, max_retries)
}

pub fn make_scraped_listing() -> ScrapedListing {
    ScrapedListing {
        name: "Maison avec jardin".to_string(),
        description: Some("Proche du centre".to_string()),
        price: 325_000.0,
        size: 98.0,
        city: "Nantes".to_string(),
        post_code: "44000".to_string(),
        rooms: 4,
        dpe: Some("C".to_string()),
    }
}

pub fn make_test_listing(url: &str) -> Listing {
    let scraped = make_scraped_listing();
    Listing {
        id: Uuid::new_v4(),
        name: scraped.name,
        description: scraped.description,
        price: scraped.price,
        size: scraped.size,
        city: scraped.city,
        post_code: scraped.post_code,
        rooms: scraped.rooms,
        dpe: scraped.dpe,
        url: url.to_string(),
        is_favorite: false,
        is_archived: false,
        is_housia_picked: false,
        is_user_picked: false,
        created_at: Utc::now(),
    }
}

/// Poll `condition` until it holds, panicking after five seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
