//! Well-known names shared with the external image-processing worker.
//!
//! These must match what the worker listens on and publishes to; they are
//! the defaults for the corresponding environment variables.

/// Queue the worker consumes jobs from.
pub const DEFAULT_QUEUE_NAME: &str = "image-processor";

/// Key prefix of the Bull-compatible queue layout.
pub const DEFAULT_QUEUE_PREFIX: &str = "bull";

/// Job name the worker's processor is registered under.
pub const DEFAULT_JOB_PATTERN: &str = "image-processor";

/// Pub/sub channel the worker publishes progress events on.
pub const DEFAULT_PROGRESS_CHANNEL: &str = "image-processor-progress";
