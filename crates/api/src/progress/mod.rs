//! Progress delivery from the worker's broadcast channel to live clients.
//!
//! [`ProgressSubscriber`] consumes one feed of raw payloads and routes each
//! decoded event to the owning user's connection; [`supervise`] keeps a
//! subscriber attached to the channel across transport failures.

pub mod subscriber;
pub mod supervisor;

pub use subscriber::{Dispatch, ProgressSubscriber, SubscriberError};
pub use supervisor::supervise;
