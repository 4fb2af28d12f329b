use std::sync::Arc;

use imgflow_events::{reconnect_loop, ProgressFeedSource, Reconnect, ReconnectConfig};
use tokio_util::sync::CancellationToken;

use crate::progress::subscriber::{ProgressSubscriber, SubscriberError};

/// Keep `subscriber` attached to `source` until `cancel` fires.
///
/// The first subscription must succeed outright. After a transport loss
/// the feed is re-established with exponential backoff; once
/// `reconnect.max_attempts` consecutive attempts fail, the error is
/// returned and the caller is expected to bring the process down.
/// Events published while detached are lost.
pub async fn supervise(
    source: Arc<dyn ProgressFeedSource>,
    subscriber: ProgressSubscriber,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) -> Result<(), SubscriberError> {
    let mut feed = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        feed = source.connect() => feed?,
    };

    loop {
        match subscriber.run(feed, &cancel).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(
                    channel = source.channel(),
                    error = %e,
                    "Progress subscription lost",
                );
            }
        }

        feed = match reconnect_loop(source.as_ref(), &reconnect, &cancel).await {
            Reconnect::Connected(feed) => feed,
            Reconnect::Cancelled => return Ok(()),
            Reconnect::GaveUp {
                attempts,
                last_error,
            } => {
                return Err(SubscriberError::ReconnectExhausted {
                    channel: source.channel().to_string(),
                    attempts,
                    last_error,
                });
            }
        };
    }
}
