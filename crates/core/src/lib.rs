//! Shared domain types for the imgflow progress-delivery service.
//!
//! - [`job`] -- the processing request placed on the durable queue.
//! - [`progress`] -- progress events published by workers, plus decoding.
//! - [`defaults`] -- well-known queue, channel and pattern names.

pub mod defaults;
pub mod error;
pub mod job;
pub mod progress;
pub mod types;
pub mod validation;

pub use job::{Job, JobPayload};
pub use progress::{DecodeError, ProgressEvent, ProgressStatus};
