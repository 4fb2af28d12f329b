use async_trait::async_trait;
use imgflow_core::error::CoreError;
use imgflow_core::Job;

/// Result of a single enqueue attempt that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueReceipt {
    /// A new runnable job was created.
    Created,
    /// A job with the same id already exists; nothing was added.
    Duplicate,
}

/// Errors raised by a [`JobQueue`] backend.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The job failed validation and was never sent to the backend.
    #[error("invalid job: {0}")]
    InvalidJob(#[from] CoreError),

    #[error("failed to serialize job: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("queue transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("unexpected queue reply: {0}")]
    UnexpectedReply(String),
}

/// A durable, at-least-once work queue.
///
/// Implementations perform exactly one attempt per call and never retry;
/// the outcome of that attempt is returned to the caller.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue `job`, deduplicating on `job.job_id`.
    async fn enqueue(&self, job: &Job) -> Result<EnqueueReceipt, QueueError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), QueueError>;
}
