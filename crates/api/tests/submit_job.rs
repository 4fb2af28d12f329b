//! Integration tests for handing uploads to the image worker queue.

mod common;

use assert_matches::assert_matches;
use common::in_memory_state;
use imgflow_queue::EnqueueOutcome;

#[tokio::test]
async fn upload_is_enqueued_with_configured_pattern() {
    let (state, queue) = in_memory_state();

    let outcome = state.submit_job("img-1", "u1", "cat.png").await;
    assert_eq!(outcome, EnqueueOutcome::Enqueued);

    let pending = queue.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].image_id, "img-1");
    assert_eq!(pending[0].user_id, "u1");
    assert_eq!(pending[0].filename, "cat.png");
    assert_eq!(pending[0].pattern, state.config.redis.job_pattern);
}

#[tokio::test]
async fn same_image_is_only_queued_once() {
    let (state, queue) = in_memory_state();

    assert_eq!(
        state.submit_job("img-1", "u1", "cat.png").await,
        EnqueueOutcome::Enqueued
    );
    assert_eq!(
        state.submit_job("img-1", "u1", "cat.png").await,
        EnqueueOutcome::AlreadyQueued
    );
    assert_eq!(queue.len().await, 1);
}

#[tokio::test]
async fn taken_job_is_still_a_duplicate() {
    let (state, queue) = in_memory_state();

    state.submit_job("img-1", "u1", "cat.png").await;
    assert!(queue.take_next().await.is_some());

    assert_eq!(
        state.submit_job("img-1", "u1", "cat.png").await,
        EnqueueOutcome::AlreadyQueued
    );
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn unavailable_queue_degrades_instead_of_failing() {
    let (state, queue) = in_memory_state();
    queue.set_unavailable(true).await;

    let outcome = state.submit_job("img-1", "u1", "cat.png").await;
    assert!(outcome.is_degraded());
    assert!(queue.is_empty().await);

    // Nothing was recorded, so the next attempt is a fresh enqueue.
    queue.set_unavailable(false).await;
    assert_eq!(
        state.submit_job("img-1", "u1", "cat.png").await,
        EnqueueOutcome::Enqueued
    );
}

#[tokio::test]
async fn invalid_job_is_degraded() {
    let (state, queue) = in_memory_state();

    let outcome = state.submit_job("", "u1", "cat.png").await;
    assert_matches!(outcome, EnqueueOutcome::Degraded(_));
    assert!(queue.is_empty().await);
}
