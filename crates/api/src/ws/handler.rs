use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use imgflow_core::validation::validate_user_id;

use crate::config::DeliveryConfig;
use crate::error::AppError;
use crate::state::AppState;
use crate::ws::registry::{ConnectionHandle, ConnectionRegistry, OutboundReceiver};

/// HTTP handler that upgrades `GET /ws/users/{user_id}/images` to a
/// WebSocket.
///
/// The user id is validated before the upgrade is considered, so a bad id
/// gets a JSON 400 even from clients that did not send upgrade headers.
pub async fn ws_handler(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Err(e) = validate_user_id(&user_id) {
        return AppError::from(e).into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let registry = Arc::clone(&state.registry);
    let delivery = state.config.delivery.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, registry, delivery))
        .into_response()
}

/// Run one progress session.
///
/// 1. Registers the connection under `user_id` (superseding any older one).
/// 2. Spawns a writer task that drains the connection's outbound queue.
/// 3. Reads from the socket purely to notice when it goes away.
/// 4. Unregisters (guarded) and closes the handle on the way out.
async fn handle_socket(
    socket: WebSocket,
    user_id: String,
    registry: Arc<ConnectionRegistry>,
    delivery: DeliveryConfig,
) {
    let (handle, outbound) = ConnectionHandle::new(delivery.outbound_capacity);
    let conn_id = handle.conn_id();

    registry.register(user_id.clone(), handle.clone()).await;
    tracing::info!(user_id = %user_id, conn_id = %conn_id, "Progress connection opened");

    let (sink, mut stream) = socket.split();

    let writer = tokio::spawn(write_loop(
        sink,
        outbound,
        handle.clone(),
        user_id.clone(),
        Arc::clone(&registry),
        delivery.write_timeout,
    ));

    let cancel = handle.cancellation().clone();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(conn_id = %conn_id, "Progress connection closed by server");
                break;
            }
            next = stream.next() => match next {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(conn_id = %conn_id, "Pong received");
                }
                // Clients have nothing to say on this socket.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    }

    registry.unregister(&user_id, &handle).await;
    handle.close();
    if let Err(e) = writer.await {
        tracing::warn!(conn_id = %conn_id, error = %e, "Progress writer task failed");
    }
    tracing::info!(
        user_id = %user_id,
        conn_id = %conn_id,
        connected_secs = (chrono::Utc::now() - handle.registered_at()).num_seconds(),
        "Progress connection closed",
    );
}

/// Forward queued messages to the socket until the handle is closed.
///
/// Each write is bounded by `write_timeout`. A failed or timed-out write
/// means the peer is gone: the connection is evicted right away, which also
/// stops the read loop.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: OutboundReceiver,
    handle: ConnectionHandle,
    user_id: String,
    registry: Arc<ConnectionRegistry>,
    write_timeout: Duration,
) {
    let cancel = handle.cancellation().clone();

    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            message = outbound.recv() => message,
        };
        let Some(message) = message else { break };

        let failure = match tokio::time::timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("write timed out after {write_timeout:?}"),
        };

        tracing::warn!(
            user_id = %user_id,
            conn_id = %handle.conn_id(),
            error = %failure,
            "Progress delivery failed, dropping connection",
        );
        registry.evict(&user_id, &handle).await;
        return;
    }

    let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
}
