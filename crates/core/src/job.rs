//! Processing jobs handed to the external image worker.
//!
//! A [`Job`] is created by the upload flow once the original image has been
//! stored. Its wire form, [`JobPayload`], is what the worker receives.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::defaults::DEFAULT_JOB_PATTERN;
use crate::error::CoreError;
use crate::types::{Timestamp, UserId};

/// A unit of requested processing work.
///
/// `job_id` doubles as the image id and as the queue's dedupe key.
/// Immutable once enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub user_id: UserId,
    pub filename: String,
    /// Job name the worker dispatches on.
    pub pattern: String,
    pub enqueued_at: Timestamp,
}

impl Job {
    /// Create a job with the default pattern, stamped with the current time.
    pub fn new(
        job_id: impl Into<String>,
        user_id: impl Into<UserId>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            user_id: user_id.into(),
            filename: filename.into(),
            pattern: DEFAULT_JOB_PATTERN.to_string(),
            enqueued_at: Utc::now(),
        }
    }

    /// Override the job pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// The JSON body the worker receives.
    pub fn payload(&self) -> JobPayload {
        JobPayload {
            image_id: self.job_id.clone(),
            user_id: self.user_id.clone(),
            filename: self.filename.clone(),
            pattern: self.pattern.clone(),
        }
    }

    /// Check that every field the worker relies on is present.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.payload().validate().map_err(CoreError::from)
    }
}

/// Wire form of a [`Job`]: `{image_id, user_id, filename, pattern}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct JobPayload {
    #[validate(length(min = 1))]
    pub image_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub filename: String,
    #[validate(length(min = 1))]
    pub pattern: String,
}
