use std::sync::Arc;
use std::time::Duration;

use crate::ws::registry::ConnectionRegistry;

/// Spawn a background task that sends periodic Ping frames to all
/// registered connections.
///
/// Pings keep idle connections open through proxies and make dead peers
/// surface as read or write errors. The returned `JoinHandle` is aborted
/// during shutdown.
pub fn start_heartbeat(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let pinged = registry.ping_all().await;
            tracing::debug!(pinged, "Progress connection heartbeat");
        }
    })
}
