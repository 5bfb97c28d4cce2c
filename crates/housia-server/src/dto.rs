use serde::{Deserialize, Serialize};

use housia_core::job::{JobDescriptor, JobStatus};

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub message: &'static str,
    pub job_id: String,
    pub status: JobStatus,
}

impl From<JobDescriptor> for SubmitResponse {
    fn from(descriptor: JobDescriptor) -> Self {
        Self {
            message: "Job queued successfully",
            job_id: descriptor.job_id,
            status: descriptor.status,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
