//! Redis pub/sub progress feed.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::feed::{PayloadStream, ProgressFeedSource, TransportError};

/// Subscribes to one Redis pub/sub channel.
///
/// The message stream of a Redis subscription only ends when the
/// connection does, so the end of that stream is reported as
/// [`TransportError::Disconnected`].
pub struct RedisProgressFeed {
    client: redis::Client,
    channel: String,
}

impl RedisProgressFeed {
    /// Validate `redis_url` and remember the channel. Does not connect.
    pub fn new(redis_url: &str, channel: impl Into<String>) -> Result<Self, TransportError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl ProgressFeedSource for RedisProgressFeed {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn connect(&self) -> Result<PayloadStream, TransportError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        tracing::info!(channel = %self.channel, "Subscribed to progress channel");

        let messages = pubsub.into_on_message().map(|msg| {
            // Non-UTF-8 bodies fall through to JSON decoding and get
            // rejected there like any other malformed payload.
            Ok::<_, TransportError>(String::from_utf8_lossy(msg.get_payload_bytes()).into_owned())
        });
        let lost = stream::once(async { Err(TransportError::Disconnected) });

        Ok(messages.chain(lost).boxed())
    }
}
