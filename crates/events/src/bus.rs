//! In-process progress channel backed by a `tokio::sync::broadcast` channel.
//!
//! [`ProgressBus`] stands in for the Redis channel when the worker runs in
//! the same process (tests, local development). It is designed to be shared
//! via `Arc<ProgressBus>`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use tokio::sync::broadcast;

use crate::feed::{PayloadStream, ProgressFeedSource, TransportError};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum Frame {
    Payload(String),
    /// Ends every live subscription with a transport error.
    Severed,
}

/// In-process fan-out channel for raw progress payloads.
///
/// Dropping the bus closes the channel; live subscriptions then end
/// cleanly, the same way a shutdown would.
pub struct ProgressBus {
    name: String,
    sender: broadcast::Sender<Frame>,
    refuse_connections: AtomicBool,
}

impl ProgressBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed payloads are dropped
    /// and slow subscribers skip ahead.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            name: name.into(),
            sender,
            refuse_connections: AtomicBool::new(false),
        }
    }

    /// Publish a raw payload to all current subscribers.
    ///
    /// If there are no active subscribers the payload is silently dropped.
    pub fn publish(&self, payload: impl Into<String>) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(Frame::Payload(payload.into()));
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Drop every live subscription with [`TransportError::Disconnected`],
    /// as if the network connection to the broker was lost.
    pub fn sever(&self) {
        let _ = self.sender.send(Frame::Severed);
    }

    /// Make subsequent [`connect`](ProgressFeedSource::connect) calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(imgflow_core::defaults::DEFAULT_PROGRESS_CHANNEL, DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ProgressFeedSource for ProgressBus {
    fn channel(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<PayloadStream, TransportError> {
        if self.refuse_connections.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!(
                "bus {} is refusing connections",
                self.name
            )));
        }

        let receiver = self.sender.subscribe();
        let payloads = stream::unfold(Some(receiver), |state| async move {
            let mut receiver = state?;
            loop {
                match receiver.recv().await {
                    Ok(Frame::Payload(payload)) => return Some((Ok(payload), Some(receiver))),
                    Ok(Frame::Severed) => return Some((Err(TransportError::Disconnected), None)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Progress subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(payloads.boxed())
    }
}
