use crate::error::AppError;
use crate::job::JobStatusRecord;
use crate::traits::StatusStore;

/// Best-effort writer for job status records.
///
/// Store failures are logged and swallowed: the status store mirrors job
/// progress for polling clients, the broker is the source of truth.
/// Transitions out of a terminal status are refused.
#[derive(Debug, Clone)]
pub struct StatusRecorder<S: StatusStore> {
    store: S,
}

impl<S: StatusStore> StatusRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Last known record, or `None` when unknown or unreadable.
    pub async fn current(&self, job_id: &str) -> Option<JobStatusRecord> {
        match self.store.get(job_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Failed to read job status");
                None
            }
        }
    }

    /// Write the first record of a freshly created job.
    ///
    /// The job is published before it is seeded, so a fast worker may
    /// already have reported on it. The write only lands on an empty key.
    pub async fn seed(&self, record: JobStatusRecord) -> bool {
        match self.store.set_if_absent(&record).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!(job_id = %record.id, "Job already reported on, not seeding");
                false
            }
            Err(e) => {
                write_failed(&record, &e);
                false
            }
        }
    }

    /// Write `record` unless it would move the job backwards or out of a
    /// terminal status.
    ///
    /// Returns whether the record was stored.
    pub async fn record(&self, record: JobStatusRecord) -> bool {
        match self.store.advance(&record).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(
                    job_id = %record.id,
                    next = %record.status,
                    "Ignoring status transition refused by the stored status"
                );
                false
            }
            Err(e) => {
                write_failed(&record, &e);
                false
            }
        }
    }
}

fn write_failed(record: &JobStatusRecord, error: &AppError) {
    tracing::warn!(
        job_id = %record.id,
        status = %record.status,
        %error,
        "Failed to write job status"
    );
}
