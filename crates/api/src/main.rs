use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imgflow_api::config::ServerConfig;
use imgflow_api::progress::{self, ProgressSubscriber};
use imgflow_api::router::build_app_router;
use imgflow_api::state::AppState;
use imgflow_api::ws;
use imgflow_events::{ProgressFeedSource, RedisProgressFeed};
use imgflow_queue::{JobQueue, RedisJobQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job queue ---
    let job_queue = RedisJobQueue::connect(
        &config.redis.url,
        &config.redis.queue_name,
        &config.redis.queue_prefix,
    )
    .await
    .context("Failed to connect to job queue")?;
    let job_queue: Arc<dyn JobQueue> = Arc::new(job_queue);

    // --- Connection registry ---
    let registry = Arc::new(ws::ConnectionRegistry::new());

    // --- Heartbeat ---
    let heartbeat_handle =
        ws::start_heartbeat(Arc::clone(&registry), config.delivery.heartbeat_interval);

    // --- Progress subscriber ---
    // Fired on SIGINT/SIGTERM, and by the subscriber itself when the
    // progress channel cannot be re-established.
    let shutdown = CancellationToken::new();

    let feed: Arc<dyn ProgressFeedSource> = Arc::new(
        RedisProgressFeed::new(&config.redis.url, config.redis.progress_channel.clone())
            .context("Invalid REDIS_URL for progress channel")?,
    );
    let subscriber = ProgressSubscriber::new(Arc::clone(&registry), config.delivery.write_timeout);
    let subscriber_shutdown = shutdown.clone();
    let reconnect = config.reconnect.clone();
    let subscriber_handle = tokio::spawn(async move {
        let result =
            progress::supervise(feed, subscriber, reconnect, subscriber_shutdown.clone()).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Progress subscriber failed, shutting down");
            subscriber_shutdown.cancel();
        }
        result
    });
    tracing::info!(channel = %config.redis.progress_channel, "Progress subscriber spawned");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        job_queue,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config
            .host
            .parse::<IpAddr>()
            .context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    shutdown.cancel();

    let subscriber_result = match tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        subscriber_handle,
    )
    .await
    {
        Ok(Ok(result)) => result.map_err(anyhow::Error::from),
        Ok(Err(e)) => Err(anyhow::Error::from(e).context("Progress subscriber task panicked")),
        Err(_) => {
            tracing::warn!("Progress subscriber did not stop in time");
            Ok(())
        }
    };
    tracing::info!("Progress subscriber stopped");

    let connections = registry.connection_count().await;
    tracing::info!(connections, "Closing remaining progress connections");
    registry.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
    subscriber_result
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering; `LOG_FORMAT=json` switches to one JSON
/// object per line.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "imgflow_api=debug,imgflow_events=debug,imgflow_queue=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles SIGINT (Ctrl-C), SIGTERM (on Unix), and `shutdown` being
/// cancelled from inside the process.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
        () = shutdown.cancelled() => {
            tracing::info!("Shutdown requested internally");
        }
    }
}
