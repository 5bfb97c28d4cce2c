use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Kind of work a job carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    HouseScraping,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::HouseScraping => "house-scraping",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last known state of a job, as mirrored in the status store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }

    /// Position in the lifecycle: queued, then processing, then a terminal status.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Success | JobStatus::Error => 2,
        }
    }

    /// Statuses only move forward, and terminal states accept no further
    /// transition. Processing may be written again when a job is retried.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && self.rank() <= next.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "success" => Ok(JobStatus::Success),
            "error" => Ok(JobStatus::Error),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// A scrape job as carried on the queue.
///
/// Only `retry_count` changes over the job's lifetime, and it travels
/// inside the message so it survives worker restarts and broker requeues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Job {
    /// Create a fresh house-scraping job with an unused retry budget.
    pub fn new(url: impl Into<String>, max_retries: u32) -> Self {
        Self {
            id: format!("scrape-{}", Uuid::new_v4()),
            job_type: JobType::HouseScraping,
            url: url.into(),
            created_at: Utc::now(),
            retry_count: 0,
            max_retries,
        }
    }

    /// Strict deserialization of a queue payload.
    ///
    /// Anything that is not a well-formed job is a [`AppError::PoisonMessageError`].
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        let job: Job = serde_json::from_slice(payload)
            .map_err(|e| AppError::PoisonMessageError(e.to_string()))?;

        if job.id.trim().is_empty() {
            return Err(AppError::PoisonMessageError("empty job id".into()));
        }
        if job.url.trim().is_empty() {
            return Err(AppError::PoisonMessageError(format!(
                "job {} has an empty url",
                job.id
            )));
        }
        if job.retry_count > job.max_retries {
            return Err(AppError::PoisonMessageError(format!(
                "job {} has retryCount {} above maxRetries {}",
                job.id, job.retry_count, job.max_retries
            )));
        }

        Ok(job)
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, AppError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 1-indexed attempt number of the current delivery.
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    pub fn has_retry_budget(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// The same job with its retry counter advanced by one.
    pub fn retried(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

/// Status-store value for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusRecord {
    pub id: String,
    pub status: JobStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusRecord {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            updated_at: Utc::now(),
            error: None,
        }
    }

    pub fn queued(id: impl Into<String>) -> Self {
        Self::new(id, JobStatus::Queued)
    }

    pub fn processing(id: impl Into<String>) -> Self {
        Self::new(id, JobStatus::Processing)
    }

    pub fn success(id: impl Into<String>) -> Self {
        Self::new(id, JobStatus::Success)
    }

    pub fn error(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: Some(detail.into()),
            ..Self::new(id, JobStatus::Error)
        }
    }
}

/// Synchronous answer to a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub job_id: String,
    pub status: JobStatus,
}
