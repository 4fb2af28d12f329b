//! Exponential-backoff reconnection for the progress feed.
//!
//! When a live subscription drops, the supervisor calls [`reconnect_loop`]
//! to keep retrying with increasing delays until the feed is restored, the
//! retry budget runs out, or the [`CancellationToken`] is triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::feed::{PayloadStream, ProgressFeedSource, TransportError};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Consecutive attempts before giving up. `0` disables reconnection.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// How a reconnection episode ended.
pub enum Reconnect {
    Connected(PayloadStream),
    Cancelled,
    GaveUp {
        attempts: u32,
        last_error: Option<TransportError>,
    },
}

/// Re-subscribe to `source` with exponential backoff.
///
/// Sleeps before every attempt (the previous subscription has just failed,
/// so an immediate retry is unlikely to help).
pub async fn reconnect_loop(
    source: &dyn ProgressFeedSource,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Reconnect {
    let mut delay = config.initial_delay;
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        tracing::info!(
            channel = source.channel(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to progress channel",
        );

        // Wait before the attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return Reconnect::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(channel = source.channel(), "Reconnect cancelled");
                return Reconnect::Cancelled;
            }
            result = source.connect() => {
                match result {
                    Ok(feed) => {
                        tracing::info!(
                            channel = source.channel(),
                            attempt,
                            "Reconnected to progress channel",
                        );
                        return Reconnect::Connected(feed);
                    }
                    Err(e) => {
                        tracing::warn!(
                            channel = source.channel(),
                            error = %e,
                            "Reconnect attempt {attempt} failed",
                        );
                        last_error = Some(e);
                    }
                }
            }
        }

        delay = next_delay(delay, config);
    }

    Reconnect::GaveUp {
        attempts: config.max_attempts,
        last_error,
    }
}
