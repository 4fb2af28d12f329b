#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use imgflow_api::config::{DeliveryConfig, RedisConfig, ServerConfig};
use imgflow_api::router::build_app_router;
use imgflow_api::state::AppState;
use imgflow_api::ws::ConnectionRegistry;
use imgflow_events::{ProgressBus, ReconnectConfig};
use imgflow_queue::{InMemoryJobQueue, JobQueue};

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a short write timeout, and millisecond reconnect delays.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            queue_name: "image-processor".to_string(),
            queue_prefix: "bull".to_string(),
            job_pattern: "image-processor".to_string(),
            progress_channel: "image-processor-progress".to_string(),
        },
        delivery: DeliveryConfig {
            write_timeout: Duration::from_millis(500),
            outbound_capacity: 16,
            heartbeat_interval: Duration::from_secs(30),
        },
        reconnect: fast_reconnect(3),
    }
}

pub fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        multiplier: 2.0,
        max_attempts,
    }
}

/// App state backed by the given queue and a fresh registry.
pub fn test_state(job_queue: Arc<dyn JobQueue>) -> AppState {
    AppState {
        config: Arc::new(test_config()),
        registry: Arc::new(ConnectionRegistry::new()),
        job_queue,
    }
}

/// App state backed by an in-memory queue.
pub fn in_memory_state() -> (AppState, Arc<InMemoryJobQueue>) {
    let queue = Arc::new(InMemoryJobQueue::new());
    let state = test_state(queue.clone());
    (state, queue)
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

/// Issue a GET request against the router without a network listener.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve the app on an ephemeral localhost port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = build_test_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Wait up to two seconds for `user_id` to be (or stop being) registered.
pub async fn wait_for_registration(
    registry: &ConnectionRegistry,
    user_id: &str,
    registered: bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if registry.contains(user_id).await == registered {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wait up to two seconds for the bus to have exactly `count` subscriptions.
pub async fn wait_for_subscribers(bus: &ProgressBus, count: usize) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if bus.subscriber_count() == count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
