pub mod config;
pub mod error;
pub mod gateway;
pub mod job;
pub mod models;
pub mod status;
pub mod traits;
pub mod worker;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{SubmissionConfig, WorkerConfig};
pub use error::AppError;
pub use gateway::{SubmissionGateway, validate_url};
pub use job::{Job, JobDescriptor, JobStatus, JobStatusRecord, JobType};
pub use models::{Listing, NewListing, ScrapedListing};
pub use traits::{Broker, Deliveries, Delivery, ListingStore, PromptSource, ScrapeDelegate, StatusStore};
pub use worker::{TracingWorkerReporter, WorkerEvent, WorkerReporter, WorkerService};
