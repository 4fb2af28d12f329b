//! Tests for routing progress payloads to live connections.
//!
//! An in-process `ProgressBus` stands in for the Redis channel so the full
//! receive loop, reconnection and eviction paths run without a broker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::ws::Message;
use imgflow_api::progress::{supervise, Dispatch, ProgressSubscriber, SubscriberError};
use imgflow_api::ws::{ConnectionHandle, ConnectionRegistry, OutboundReceiver};
use imgflow_events::{ProgressBus, ProgressFeedSource, TransportError};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use common::{fast_reconnect, wait_for_subscribers};

const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

fn event(user_id: &str, progress: i64, status: &str) -> String {
    json!({
        "image_id": "i1",
        "user_id": user_id,
        "filename": "a.png",
        "progress": progress,
        "status": status,
    })
    .to_string()
}

fn subscriber(registry: &Arc<ConnectionRegistry>) -> ProgressSubscriber {
    ProgressSubscriber::new(Arc::clone(registry), WRITE_TIMEOUT)
}

async fn connect_user(
    registry: &ConnectionRegistry,
    user_id: &str,
    capacity: usize,
) -> (ConnectionHandle, OutboundReceiver) {
    let (handle, rx) = ConnectionHandle::new(capacity);
    registry.register(user_id, handle.clone()).await;
    (handle, rx)
}

async fn next_json(rx: &mut OutboundReceiver) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("outbound queue closed");
    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text frame, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: dispatch outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn event_is_delivered_to_owning_user() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (_handle, mut rx) = connect_user(&registry, "u1", 4).await;

    let outcome = subscriber(&registry)
        .dispatch(&event("u1", 50, "resizing"))
        .await;
    assert_eq!(outcome, Dispatch::Delivered);

    let received = next_json(&mut rx).await;
    assert_eq!(
        received,
        json!({
            "image_id": "i1",
            "user_id": "u1",
            "filename": "a.png",
            "progress": 50,
            "status": "resizing",
        })
    );
}

#[tokio::test]
async fn event_for_other_user_is_not_delivered() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (_handle, mut rx) = connect_user(&registry, "u1", 4).await;

    let outcome = subscriber(&registry)
        .dispatch(&event("u2", 10, "queued"))
        .await;
    assert_eq!(outcome, Dispatch::NoConnection);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn malformed_payloads_are_discarded() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (_handle, mut rx) = connect_user(&registry, "u1", 4).await;
    let subscriber = subscriber(&registry);

    let payloads = [
        "not json".to_string(),
        r#"{"image_id":"i1","user_id":"u1"}"#.to_string(),
        event("u1", 101, "resizing"),
        event("u1", -1, "resizing"),
        event("", 10, "queued"),
    ];
    for payload in &payloads {
        assert_eq!(subscriber.dispatch(payload).await, Dispatch::Malformed);
    }
    assert!(rx.try_recv().is_err());
    assert!(registry.contains("u1").await);
}

#[tokio::test]
async fn unknown_status_is_forwarded_verbatim() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (_handle, mut rx) = connect_user(&registry, "u1", 4).await;

    let outcome = subscriber(&registry)
        .dispatch(&event("u1", 70, "watermarking"))
        .await;
    assert_eq!(outcome, Dispatch::Delivered);
    assert_eq!(next_json(&mut rx).await["status"], "watermarking");
}

// ---------------------------------------------------------------------------
// Test: failed delivery evicts the connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_receiver_is_evicted() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (handle, rx) = connect_user(&registry, "u1", 4).await;
    drop(rx);

    let outcome = subscriber(&registry)
        .dispatch(&event("u1", 50, "resizing"))
        .await;
    assert_eq!(outcome, Dispatch::Evicted);
    assert!(!registry.contains("u1").await);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn stalled_connection_is_evicted_after_write_timeout() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (handle, _rx) = connect_user(&registry, "u1", 1).await;
    let subscriber = subscriber(&registry);

    assert_eq!(
        subscriber.dispatch(&event("u1", 10, "queued")).await,
        Dispatch::Delivered
    );
    // Nobody drains the queue, so the second write cannot complete.
    assert_eq!(
        subscriber.dispatch(&event("u1", 20, "resizing")).await,
        Dispatch::Evicted
    );
    assert!(handle.is_closed());

    // Later events find no connection.
    assert_eq!(
        subscriber.dispatch(&event("u1", 30, "resizing")).await,
        Dispatch::NoConnection
    );
}

#[tokio::test]
async fn eviction_spares_successor_connection() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (old, old_rx) = connect_user(&registry, "u1", 4).await;
    drop(old_rx);
    let (_new, mut new_rx) = connect_user(&registry, "u1", 4).await;
    assert!(old.is_closed());

    // The old handle is gone from the map, so the event reaches the new one.
    assert_eq!(
        subscriber(&registry)
            .dispatch(&event("u1", 40, "resizing"))
            .await,
        Dispatch::Delivered
    );
    assert_eq!(next_json(&mut new_rx).await["progress"], 40);
}

// ---------------------------------------------------------------------------
// Test: receive loop over a feed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_skips_malformed_and_keeps_going() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (_handle, mut rx) = connect_user(&registry, "u1", 8).await;
    let bus = ProgressBus::default();
    let feed = bus.connect().await.unwrap();
    let cancel = CancellationToken::new();

    let task = {
        let subscriber = subscriber(&registry);
        let cancel = cancel.clone();
        tokio::spawn(async move { subscriber.run(feed, &cancel).await })
    };

    bus.publish("{garbage");
    bus.publish(event("u1", 100, "done"));

    let received = next_json(&mut rx).await;
    assert_eq!(received["status"], "done");
    assert_eq!(received["progress"], 100);

    cancel.cancel();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn run_returns_error_on_transport_loss() {
    let registry = Arc::new(ConnectionRegistry::new());
    let bus = ProgressBus::default();
    let feed = bus.connect().await.unwrap();

    bus.sever();

    let result = subscriber(&registry)
        .run(feed, &CancellationToken::new())
        .await;
    assert_matches!(
        result,
        Err(SubscriberError::Transport(TransportError::Disconnected))
    );
}

#[tokio::test]
async fn run_ends_cleanly_when_feed_closes() {
    let registry = Arc::new(ConnectionRegistry::new());
    let bus = ProgressBus::default();
    let feed = bus.connect().await.unwrap();
    drop(bus);

    let result = subscriber(&registry)
        .run(feed, &CancellationToken::new())
        .await;
    assert!(result.is_ok());
}

// ---------------------------------------------------------------------------
// Test: supervision across transport failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn supervise_reconnects_after_transport_loss() {
    let registry = Arc::new(ConnectionRegistry::new());
    let (_handle, mut rx) = connect_user(&registry, "u1", 64).await;
    let bus = Arc::new(ProgressBus::default());
    let cancel = CancellationToken::new();

    let task = tokio::spawn(supervise(
        bus.clone(),
        subscriber(&registry),
        fast_reconnect(5),
        cancel.clone(),
    ));

    assert!(wait_for_subscribers(&bus, 1).await);
    bus.sever();

    // Events published while detached are lost, so keep publishing until
    // the re-established subscription picks one up.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut delivered = None;
    while delivered.is_none() && tokio::time::Instant::now() < deadline {
        bus.publish(event("u1", 60, "resizing"));
        if let Ok(msg) = tokio::time::timeout(Duration::from_millis(20), rx.recv()).await {
            delivered = msg;
        }
    }
    let msg = delivered.expect("subscriber never reattached");
    assert!(matches!(&msg, Message::Text(t) if t.as_str().contains("\"progress\":60")));

    cancel.cancel();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn supervise_gives_up_after_max_attempts() {
    let registry = Arc::new(ConnectionRegistry::new());
    let bus = Arc::new(ProgressBus::default());

    let task = tokio::spawn(supervise(
        bus.clone(),
        subscriber(&registry),
        fast_reconnect(3),
        CancellationToken::new(),
    ));

    assert!(wait_for_subscribers(&bus, 1).await);
    bus.refuse_connections(true);
    bus.sever();

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("supervisor should give up")
        .unwrap();
    assert_matches!(
        result,
        Err(SubscriberError::ReconnectExhausted { attempts: 3, .. })
    );
}

#[tokio::test]
async fn supervise_fails_fast_when_first_connect_fails() {
    let registry = Arc::new(ConnectionRegistry::new());
    let bus = Arc::new(ProgressBus::default());
    bus.refuse_connections(true);

    let result = supervise(
        bus,
        subscriber(&registry),
        fast_reconnect(3),
        CancellationToken::new(),
    )
    .await;
    assert_matches!(
        result,
        Err(SubscriberError::Transport(TransportError::Connect(_)))
    );
}

#[tokio::test]
async fn supervise_stops_on_cancel() {
    let registry = Arc::new(ConnectionRegistry::new());
    let bus = Arc::new(ProgressBus::default());
    let cancel = CancellationToken::new();

    let task = tokio::spawn(supervise(
        bus.clone(),
        subscriber(&registry),
        fast_reconnect(3),
        cancel.clone(),
    ));
    assert!(wait_for_subscribers(&bus, 1).await);

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("supervisor should stop")
        .unwrap();
    assert!(result.is_ok());
}
