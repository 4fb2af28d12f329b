//! WebSocket infrastructure for pushing progress to clients.
//!
//! Provides the per-user connection registry, the heartbeat task, and the
//! HTTP upgrade handler that runs one session per connection.

mod handler;
mod heartbeat;
pub mod registry;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use registry::{ConnectionHandle, ConnectionRegistry, DeliveryError, OutboundReceiver};
