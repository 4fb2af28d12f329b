//! Progress-channel transports.
//!
//! Workers publish progress events on one broadcast channel. This crate
//! turns that channel into a stream of raw payloads:
//!
//! - [`ProgressFeedSource`] -- connect to the channel and get a
//!   [`PayloadStream`].
//! - [`RedisProgressFeed`] -- Redis pub/sub, used in production.
//! - [`ProgressBus`] -- in-process broadcast channel, for tests and local
//!   development.
//! - [`reconnect`] -- exponential backoff for re-establishing a lost feed.

pub mod bus;
pub mod feed;
pub mod pubsub;
pub mod reconnect;

pub use bus::ProgressBus;
pub use feed::{PayloadStream, ProgressFeedSource, TransportError};
pub use pubsub::RedisProgressFeed;
pub use reconnect::{reconnect_loop, Reconnect, ReconnectConfig};
