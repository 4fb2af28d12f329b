//! Process-local [`JobQueue`] with the same dedupe contract as Redis.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use imgflow_core::{Job, JobPayload};

use crate::queue::{EnqueueReceipt, JobQueue, QueueError};

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    runnable: VecDeque<Job>,
    unavailable: bool,
}

/// In-memory job queue.
///
/// Every job id is remembered for the lifetime of the queue, so a job id
/// that has already been taken by [`take_next`](Self::take_next) is still
/// treated as a duplicate.
#[derive(Default)]
pub struct InMemoryJobQueue {
    inner: Mutex<Inner>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to be taken.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.runnable.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Payloads of all waiting jobs, oldest first.
    pub async fn pending(&self) -> Vec<JobPayload> {
        self.inner
            .lock()
            .await
            .runnable
            .iter()
            .map(Job::payload)
            .collect()
    }

    /// Remove and return the oldest waiting job, as a worker would.
    pub async fn take_next(&self) -> Option<Job> {
        self.inner.lock().await.runnable.pop_front()
    }

    /// Simulate the backend going away (or coming back).
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.unavailable = unavailable;
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<EnqueueReceipt, QueueError> {
        job.validate()?;

        let mut inner = self.inner.lock().await;
        if inner.unavailable {
            return Err(QueueError::UnexpectedReply("queue unavailable".into()));
        }
        if !inner.seen.insert(job.job_id.clone()) {
            return Ok(EnqueueReceipt::Duplicate);
        }
        inner.runnable.push_back(job.clone());
        Ok(EnqueueReceipt::Created)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        if self.inner.lock().await.unavailable {
            Err(QueueError::UnexpectedReply("queue unavailable".into()))
        } else {
            Ok(())
        }
    }
}
