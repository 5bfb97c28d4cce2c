use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::AppError;
use crate::job::{Job, JobStatus, JobStatusRecord, JobType};
use crate::models::ScrapedListing;
use crate::status::StatusRecorder;
use crate::traits::{Broker, Delivery, ListingStore, PromptSource, ScrapeDelegate, StatusStore};

/// Where a job failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Scrape kept failing until the retry budget ran out.
    Scrape,
    /// The listing could not be stored.
    Persistence,
    /// Another job already stored this url.
    Duplicate,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Scrape => "scrape",
            FailureStage::Persistence => "persistence",
            FailureStage::Duplicate => "duplicate",
        }
    }
}

/// Final state of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unparseable payload, rejected without requeue.
    Poison,
    /// The job already reached a terminal status; acked without work.
    AlreadyResolved,
    /// Listing stored, job marked success.
    Succeeded,
    /// Scrape failed under budget; republished with an incremented counter.
    Requeued,
    /// Job marked error and dropped.
    Failed,
}

/// Events emitted by the worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
        queue: &'a str,
        concurrency: usize,
    },
    PoisonMessage {
        tag: u64,
        reason: &'a str,
    },
    AlreadyResolved {
        job_id: &'a str,
        status: JobStatus,
        redelivered: bool,
    },
    JobStarted {
        job_id: &'a str,
        url: &'a str,
        attempt: u32,
        /// The broker handed this message out before without an ack.
        redelivered: bool,
    },
    JobSucceeded {
        job_id: &'a str,
        listing_id: Uuid,
        retry_count: u32,
    },
    JobRetrying {
        job_id: &'a str,
        retry_count: u32,
        error: &'a str,
    },
    JobFailed {
        job_id: &'a str,
        stage: FailureStage,
        error: &'a str,
    },
    Draining {
        worker_id: &'a str,
        in_flight: usize,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started {
                worker_id,
                queue,
                concurrency,
            } => {
                tracing::info!(%worker_id, %queue, %concurrency, "Worker started");
            }
            WorkerEvent::PoisonMessage { tag, reason } => {
                tracing::error!(%tag, %reason, "Dropping malformed message");
            }
            WorkerEvent::AlreadyResolved {
                job_id,
                status,
                redelivered,
            } => {
                tracing::warn!(%job_id, %status, %redelivered, "Job already resolved, dropping message");
            }
            WorkerEvent::JobStarted {
                job_id,
                url,
                attempt,
                redelivered,
            } => {
                tracing::info!(%job_id, %url, %attempt, %redelivered, "Processing job");
            }
            WorkerEvent::JobSucceeded {
                job_id,
                listing_id,
                retry_count,
            } => {
                tracing::info!(%job_id, %listing_id, %retry_count, "Job succeeded");
            }
            WorkerEvent::JobRetrying {
                job_id,
                retry_count,
                error,
            } => {
                tracing::warn!(%job_id, %retry_count, %error, "Job requeued for retry");
            }
            WorkerEvent::JobFailed {
                job_id,
                stage,
                error,
            } => {
                tracing::error!(%job_id, stage = stage.as_str(), %error, "Job failed permanently");
            }
            WorkerEvent::Draining {
                worker_id,
                in_flight,
            } => {
                tracing::info!(%worker_id, %in_flight, "Worker draining in-flight jobs");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// Worker that consumes scrape jobs from the broker.
///
/// Per delivery: parse, mark processing, scrape, then store, retry or fail.
/// At most `config.concurrency` deliveries are handled at once.
pub struct WorkerService<B, D, P, L, S>
where
    B: Broker,
    D: ScrapeDelegate,
    P: PromptSource,
    L: ListingStore,
    S: StatusStore,
{
    broker: B,
    delegate: D,
    prompts: P,
    listings: L,
    status: StatusRecorder<S>,
    config: WorkerConfig,
}

impl<B, D, P, L, S> Clone for WorkerService<B, D, P, L, S>
where
    B: Broker,
    D: ScrapeDelegate,
    P: PromptSource,
    L: ListingStore,
    S: StatusStore,
{
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
            delegate: self.delegate.clone(),
            prompts: self.prompts.clone(),
            listings: self.listings.clone(),
            status: self.status.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B, D, P, L, S> WorkerService<B, D, P, L, S>
where
    B: Broker,
    D: ScrapeDelegate,
    P: PromptSource,
    L: ListingStore,
    S: StatusStore,
{
    pub fn new(
        broker: B,
        delegate: D,
        prompts: P,
        listings: L,
        status_store: S,
        config: WorkerConfig,
    ) -> Self {
        Self {
            broker,
            delegate,
            prompts,
            listings,
            status: StatusRecorder::new(status_store),
            config,
        }
    }

    /// Run the consume loop until cancellation or a broker failure.
    ///
    /// On exit, stops receiving, waits for in-flight jobs, then closes the
    /// broker. Returns the broker failure that stopped the loop, if any.
    pub async fn run<WR: WorkerReporter + 'static>(
        &self,
        cancel_token: CancellationToken,
        reporter: Arc<WR>,
    ) -> Result<(), AppError> {
        self.config.validate()?;
        let prefetch = u16::try_from(self.config.concurrency)
            .map_err(|_| AppError::ConfigError("worker concurrency out of range".into()))?;

        let mut deliveries = self.broker.consume(&self.config.queue, prefetch).await?;

        reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
            queue: &self.config.queue,
            concurrency: self.config.concurrency,
        });

        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let tracker = TaskTracker::new();
        let shutdown = cancel_token.child_token();
        let fatal: Arc<Mutex<Option<AppError>>> = Arc::default();

        loop {
            // Take a slot before receiving so no more than `concurrency`
            // jobs are ever in flight.
            let permit = tokio::select! {
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                () = shutdown.cancelled() => break,
            };

            let next = tokio::select! {
                next = deliveries.recv() => next,
                () = shutdown.cancelled() => break,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    record_fatal(&fatal, e);
                    break;
                }
                None => {
                    record_fatal(
                        &fatal,
                        AppError::ConnectionError("consumer stream closed".into()),
                    );
                    break;
                }
            };

            let worker = self.clone();
            let reporter = Arc::clone(&reporter);
            let fatal = Arc::clone(&fatal);
            let shutdown = shutdown.clone();
            tracker.spawn(async move {
                let _permit = permit;
                if let Err(e) = worker.handle_delivery(delivery, &*reporter).await {
                    tracing::error!(error = %e, "Broker failure while handling job, shutting down");
                    record_fatal(&fatal, e);
                    shutdown.cancel();
                }
            });
        }

        tracker.close();
        reporter.report(WorkerEvent::Draining {
            worker_id: &self.config.worker_id,
            in_flight: tracker.len(),
        });
        tracker.wait().await;
        drop(deliveries);

        let closed = self.broker.close().await;
        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.config.worker_id,
        });

        let fatal = fatal.lock().unwrap_or_else(|e| e.into_inner()).take();
        match fatal {
            Some(e) => Err(e),
            None => closed,
        }
    }

    /// Drive one delivery to a final state.
    ///
    /// `Err` is only returned for broker failures (publish/ack/nack), in
    /// which case the delivery is left unacked.
    pub async fn handle_delivery<WR: WorkerReporter + ?Sized>(
        &self,
        delivery: Delivery,
        reporter: &WR,
    ) -> Result<Outcome, AppError> {
        let job = match Job::parse(&delivery.body) {
            Ok(job) => job,
            Err(e) => {
                reporter.report(WorkerEvent::PoisonMessage {
                    tag: delivery.tag,
                    reason: &e.to_string(),
                });
                self.broker.nack(delivery.tag, false).await?;
                return Ok(Outcome::Poison);
            }
        };

        if let Some(current) = self.status.current(&job.id).await
            && current.status.is_terminal()
        {
            reporter.report(WorkerEvent::AlreadyResolved {
                job_id: &job.id,
                status: current.status,
                redelivered: delivery.redelivered,
            });
            self.broker.ack(delivery.tag).await?;
            return Ok(Outcome::AlreadyResolved);
        }

        self.status
            .record(JobStatusRecord::processing(&job.id))
            .await;
        reporter.report(WorkerEvent::JobStarted {
            job_id: &job.id,
            url: &job.url,
            attempt: job.attempt(),
            redelivered: delivery.redelivered,
        });

        let outcome = match self.scrape(&job).await {
            Ok(scraped) => self.persist(&job, scraped, reporter).await,
            Err(e) => self.retry_or_fail(&job, e, reporter).await?,
        };

        self.broker.ack(delivery.tag).await?;
        Ok(outcome)
    }

    async fn scrape(&self, job: &Job) -> Result<ScrapedListing, AppError> {
        match job.job_type {
            JobType::HouseScraping => {
                let prompt = self.prompts.active_prompt().await.map_err(|e| {
                    AppError::ScrapeError(format!("could not read the active prompt: {e}"))
                })?;

                self.delegate
                    .scrape(&job.url, &prompt)
                    .await
                    .map_err(|e| match e {
                        AppError::ScrapeError(message) => AppError::ScrapeError(message),
                        other => AppError::ScrapeError(other.to_string()),
                    })
            }
        }
    }

    /// Store the listing. Never retried: a failure here is unrelated to extraction.
    async fn persist<WR: WorkerReporter + ?Sized>(
        &self,
        job: &Job,
        scraped: ScrapedListing,
        reporter: &WR,
    ) -> Outcome {
        let listing = scraped.into_new_listing(&job.url);

        match self.listings.create(&listing).await {
            Ok(stored) => {
                self.status.record(JobStatusRecord::success(&job.id)).await;
                reporter.report(WorkerEvent::JobSucceeded {
                    job_id: &job.id,
                    listing_id: stored.id,
                    retry_count: job.retry_count,
                });
                Outcome::Succeeded
            }
            Err(e) => {
                let stage = match e {
                    AppError::DuplicateError(_) => FailureStage::Duplicate,
                    _ => FailureStage::Persistence,
                };
                let detail = e.to_string();
                self.status
                    .record(JobStatusRecord::error(&job.id, &detail))
                    .await;
                reporter.report(WorkerEvent::JobFailed {
                    job_id: &job.id,
                    stage,
                    error: &detail,
                });
                Outcome::Failed
            }
        }
    }

    async fn retry_or_fail<WR: WorkerReporter + ?Sized>(
        &self,
        job: &Job,
        error: AppError,
        reporter: &WR,
    ) -> Result<Outcome, AppError> {
        let detail = error.to_string();

        if job.has_retry_budget() {
            let retry = job.retried();
            self.broker
                .publish(&self.config.queue, retry.to_payload()?)
                .await?;
            reporter.report(WorkerEvent::JobRetrying {
                job_id: &retry.id,
                retry_count: retry.retry_count,
                error: &detail,
            });
            return Ok(Outcome::Requeued);
        }

        self.status
            .record(JobStatusRecord::error(&job.id, &detail))
            .await;
        reporter.report(WorkerEvent::JobFailed {
            job_id: &job.id,
            stage: FailureStage::Scrape,
            error: &detail,
        });
        Ok(Outcome::Failed)
    }
}

fn record_fatal(slot: &Mutex<Option<AppError>>, error: AppError) {
    let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_none() {
        *slot = Some(error);
    }
}
