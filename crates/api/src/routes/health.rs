use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the job queue backend answers.
    pub queue_healthy: bool,
    /// Live progress connections.
    pub connections: usize,
}

/// GET /health -- returns service and queue health.
///
/// Uploads keep working while the queue is down, so an unreachable queue
/// reports `degraded` rather than failing the check.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_healthy = match state.job_queue.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Job queue health check failed");
            false
        }
    };

    let status = if queue_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        queue_healthy,
        connections: state.registry.connection_count().await,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
