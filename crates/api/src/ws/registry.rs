use std::collections::HashMap;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use imgflow_core::types::{Timestamp, UserId};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Receiving half of a connection's outbound queue, drained by the
/// session's writer task.
pub type OutboundReceiver = mpsc::Receiver<Message>;

/// Why a message could not be handed to a connection.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection is closed")]
    Closed,

    #[error("connection did not accept the message within {0:?}")]
    Timeout(Duration),
}

/// Handle to one live outbound connection.
///
/// Cloning is cheap; all clones refer to the same connection. Two handles
/// are the same connection iff their [`conn_id`](Self::conn_id)s match.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: Uuid,
    sender: mpsc::Sender<Message>,
    cancel: CancellationToken,
    registered_at: Timestamp,
}

impl ConnectionHandle {
    /// Create a handle whose outbound queue holds up to `capacity` messages.
    ///
    /// Returns the receiver half so the caller can forward messages to the
    /// WebSocket sink.
    pub fn new(capacity: usize) -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        let handle = Self {
            conn_id: Uuid::new_v4(),
            sender,
            cancel: CancellationToken::new(),
            registered_at: chrono::Utc::now(),
        };
        (handle, receiver)
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    pub fn registered_at(&self) -> Timestamp {
        self.registered_at
    }

    /// Queue `message` for the writer task, waiting at most `timeout` for
    /// room in the queue.
    pub async fn deliver(&self, message: Message, timeout: Duration) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.sender
            .send_timeout(message, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => DeliveryError::Timeout(timeout),
                SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Queue `message` only if there is room right now.
    pub fn try_push(&self, message: Message) -> bool {
        !self.is_closed() && self.sender.try_send(message).is_ok()
    }

    /// Ask the session owning this connection to shut it down. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled when the connection is closed, superseded or evicted.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Maps each user to at most one live connection.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Every operation holds the lock only for
/// an O(1) map access, never across I/O.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Install `handle` as the connection for `user_id`.
    ///
    /// Last writer wins: a previously registered connection for the same
    /// user is closed right after the new one is installed and returned.
    pub async fn register(
        &self,
        user_id: impl Into<UserId>,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let user_id = user_id.into();
        let previous = self
            .connections
            .write()
            .await
            .insert(user_id.clone(), handle.clone());

        let superseded = previous.filter(|old| old.conn_id != handle.conn_id);
        if let Some(old) = &superseded {
            old.close();
            tracing::info!(
                user_id = %user_id,
                old_conn_id = %old.conn_id,
                new_conn_id = %handle.conn_id,
                "Superseded previous connection",
            );
        }
        superseded
    }

    /// Remove the connection for `user_id`, but only if it is `handle`.
    ///
    /// Returns `false` (and changes nothing) when the user has no
    /// connection or a newer one has replaced `handle`, so a stale
    /// session's cleanup can never evict its successor.
    pub async fn unregister(&self, user_id: &str, handle: &ConnectionHandle) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(user_id) {
            Some(current) if current.conn_id == handle.conn_id => {
                connections.remove(user_id);
                true
            }
            _ => false,
        }
    }

    /// The live connection for `user_id`, if any.
    pub async fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.connections.read().await.get(user_id).cloned()
    }

    /// Treat `handle` as dead: unregister it (guarded) and close it.
    ///
    /// Safe to call from several places for the same handle.
    pub async fn evict(&self, user_id: &str, handle: &ConnectionHandle) -> bool {
        let removed = self.unregister(user_id, handle).await;
        handle.close();
        if removed {
            tracing::info!(user_id = %user_id, conn_id = %handle.conn_id, "Evicted dead connection");
        }
        removed
    }

    /// Return the current number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.connections.read().await.contains_key(user_id)
    }

    /// Queue a Ping frame on every connection that has room for it.
    ///
    /// Returns the number of connections pinged. Full queues are skipped;
    /// a stalled connection is caught by the write timeout instead.
    pub async fn ping_all(&self) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| conn.try_push(Message::Ping(Bytes::new())))
            .count()
    }

    /// Close every connection, then clear the map.
    ///
    /// Used during graceful shutdown; each session sends its client a Close
    /// frame as it winds down.
    pub async fn shutdown_all(&self) {
        let mut connections = self.connections.write().await;
        let count = connections.len();
        for conn in connections.values() {
            conn.close();
        }
        connections.clear();
        tracing::info!(count, "Closed all progress connections");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
