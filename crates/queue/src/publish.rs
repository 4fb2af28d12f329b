//! Best-effort enqueue for the upload flow.
//!
//! By the time a job is enqueued the upload has already been persisted.
//! A queue failure degrades the experience (no processing, no progress)
//! but must never fail the upload, so [`enqueue_after_upload`] reports an
//! outcome instead of an error.

use imgflow_core::Job;

use crate::queue::{EnqueueReceipt, JobQueue};

/// What happened to a job handed over after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    /// The job id was already queued; no second run was scheduled.
    AlreadyQueued,
    /// The attempt failed; the upload stands but will not be processed.
    Degraded(String),
}

impl EnqueueOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, EnqueueOutcome::Degraded(_))
    }
}

/// Enqueue `job` once, logging the result. Never retries.
pub async fn enqueue_after_upload(queue: &dyn JobQueue, job: &Job) -> EnqueueOutcome {
    match queue.enqueue(job).await {
        Ok(EnqueueReceipt::Created) => {
            tracing::info!(
                job_id = %job.job_id,
                user_id = %job.user_id,
                pattern = %job.pattern,
                "Processing job enqueued",
            );
            EnqueueOutcome::Enqueued
        }
        Ok(EnqueueReceipt::Duplicate) => {
            tracing::info!(job_id = %job.job_id, "Processing job already queued");
            EnqueueOutcome::AlreadyQueued
        }
        Err(e) => {
            tracing::warn!(
                job_id = %job.job_id,
                user_id = %job.user_id,
                error = %e,
                "Failed to enqueue processing job; upload kept without processing",
            );
            EnqueueOutcome::Degraded(e.to_string())
        }
    }
}
