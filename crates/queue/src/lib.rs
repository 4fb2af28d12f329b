//! Job publishing for the external image worker.
//!
//! - [`JobQueue`] -- the enqueue contract, keyed by a caller-supplied job id
//!   that doubles as the dedupe key.
//! - [`RedisJobQueue`] -- Bull-compatible Redis backend used in production.
//! - [`InMemoryJobQueue`] -- process-local backend with the same dedupe
//!   semantics, for tests and local development.
//! - [`enqueue_after_upload`] -- best-effort wrapper for the upload flow.

pub mod bull;
pub mod in_memory;
pub mod publish;
pub mod queue;

pub use bull::{JobOptions, RedisJobQueue};
pub use in_memory::InMemoryJobQueue;
pub use publish::{enqueue_after_upload, EnqueueOutcome};
pub use queue::{EnqueueReceipt, JobQueue, QueueError};
