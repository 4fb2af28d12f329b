use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw payloads received on the progress channel.
///
/// - `Some(Ok(payload))` -- one published message.
/// - `Some(Err(_))` -- the transport was lost; the stream yields nothing
///   after this.
/// - `None` -- the channel was closed deliberately (shutdown).
pub type PayloadStream = BoxStream<'static, Result<String, TransportError>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to progress channel: {0}")]
    Connect(String),

    #[error("progress channel disconnected")]
    Disconnected,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Something that can subscribe to the progress channel.
///
/// Each call to [`connect`](Self::connect) yields a fresh subscription;
/// messages published while no subscription is live are not replayed.
#[async_trait]
pub trait ProgressFeedSource: Send + Sync {
    /// Human-readable channel name, for logs.
    fn channel(&self) -> &str;

    async fn connect(&self) -> Result<PayloadStream, TransportError>;
}
