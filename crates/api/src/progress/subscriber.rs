use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::StreamExt;
use imgflow_core::ProgressEvent;
use imgflow_events::{PayloadStream, TransportError};
use tokio_util::sync::CancellationToken;

use crate::ws::ConnectionRegistry;

/// What happened to one inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Queued on the user's live connection.
    Delivered,
    /// The user has no live connection; the event was dropped.
    NoConnection,
    /// The payload was not a valid progress event; it was dropped.
    Malformed,
    /// The connection did not accept the event and was evicted.
    Evicted,
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("gave up reconnecting to progress channel {channel} after {attempts} attempts")]
    ReconnectExhausted {
        channel: String,
        attempts: u32,
        #[source]
        last_error: Option<TransportError>,
    },
}

/// Routes progress events to the connection registered for their user.
///
/// Delivery is at most once: an event for a user without a live
/// connection is discarded, never buffered.
pub struct ProgressSubscriber {
    registry: Arc<ConnectionRegistry>,
    write_timeout: Duration,
}

impl ProgressSubscriber {
    pub fn new(registry: Arc<ConnectionRegistry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Run the receive loop over `feed`.
    ///
    /// Returns `Ok(())` when `cancel` fires or the feed is closed
    /// deliberately, and an error when the transport is lost. A bad
    /// payload never ends the loop.
    pub async fn run(
        &self,
        mut feed: PayloadStream,
        cancel: &CancellationToken,
    ) -> Result<(), SubscriberError> {
        tracing::info!("Progress subscriber started");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Progress subscriber shutting down");
                    return Ok(());
                }
                next = feed.next() => next,
            };

            match next {
                Some(Ok(payload)) => {
                    self.dispatch(&payload).await;
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Progress channel transport lost");
                    return Err(e.into());
                }
                None => {
                    tracing::info!("Progress channel closed, subscriber shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Decode one payload and hand it to the owning user's connection.
    pub async fn dispatch(&self, payload: &str) -> Dispatch {
        let event = match ProgressEvent::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload_len = payload.len(),
                    "Discarding malformed progress payload",
                );
                return Dispatch::Malformed;
            }
        };

        if !event.status.is_known() {
            tracing::warn!(
                image_id = %event.image_id,
                status = %event.status,
                "Forwarding progress event with unknown status",
            );
        }

        let Some(handle) = self.registry.lookup(&event.user_id).await else {
            tracing::trace!(user_id = %event.user_id, "No live connection for progress event");
            return Dispatch::NoConnection;
        };

        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, image_id = %event.image_id, "Failed to encode progress event");
                return Dispatch::Malformed;
            }
        };

        match handle
            .deliver(Message::Text(text.into()), self.write_timeout)
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    user_id = %event.user_id,
                    image_id = %event.image_id,
                    progress = event.progress,
                    status = %event.status,
                    "Progress event delivered",
                );
                Dispatch::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %event.user_id,
                    conn_id = %handle.conn_id(),
                    error = %e,
                    "Progress delivery failed, dropping connection",
                );
                self.registry.evict(&event.user_id, &handle).await;
                Dispatch::Evicted
            }
        }
    }
}
