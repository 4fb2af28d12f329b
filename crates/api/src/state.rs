use std::sync::Arc;

use imgflow_core::Job;
use imgflow_queue::{enqueue_after_upload, EnqueueOutcome, JobQueue};

use crate::config::ServerConfig;
use crate::ws::ConnectionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Live progress connections, one per user.
    pub registry: Arc<ConnectionRegistry>,
    /// Queue the external image worker consumes from.
    pub job_queue: Arc<dyn JobQueue>,
}

impl AppState {
    /// Hand a freshly stored upload to the image worker.
    ///
    /// Called by the upload flow after the image has been persisted. Uses
    /// the configured job pattern and never fails the upload: a queue
    /// problem comes back as [`EnqueueOutcome::Degraded`].
    pub async fn submit_job(
        &self,
        image_id: &str,
        user_id: &str,
        filename: &str,
    ) -> EnqueueOutcome {
        let job = Job::new(image_id, user_id, filename)
            .with_pattern(self.config.redis.job_pattern.clone());
        enqueue_after_upload(self.job_queue.as_ref(), &job).await
    }
}
