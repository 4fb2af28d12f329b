//! Progress events published by the image worker.
//!
//! Workers publish JSON objects of the shape
//! `{"image_id", "user_id", "filename", "progress", "status"}` on the
//! progress channel. [`ProgressEvent::decode`] parses and validates one
//! payload; only the shape is checked, never the legality of a status
//! transition.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::UserId;

/// Processing stage reported by the worker.
///
/// Expected (but unverified) sequence:
/// `queued -> processing -> {resizing|uploading}* -> {done|failed}`.
///
/// Values the worker adds later are kept verbatim in [`Unknown`](Self::Unknown)
/// and serialize back to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProgressStatus {
    Queued,
    Processing,
    Resizing,
    Uploading,
    Done,
    Failed,
    Unknown(String),
}

impl ProgressStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProgressStatus::Queued => "queued",
            ProgressStatus::Processing => "processing",
            ProgressStatus::Resizing => "resizing",
            ProgressStatus::Uploading => "uploading",
            ProgressStatus::Done => "done",
            ProgressStatus::Failed => "failed",
            ProgressStatus::Unknown(other) => other,
        }
    }

    /// Whether this is one of the statuses this service knows about.
    pub fn is_known(&self) -> bool {
        !matches!(self, ProgressStatus::Unknown(_))
    }
}

impl From<String> for ProgressStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => ProgressStatus::Queued,
            "processing" => ProgressStatus::Processing,
            "resizing" => ProgressStatus::Resizing,
            "uploading" => ProgressStatus::Uploading,
            "done" => ProgressStatus::Done,
            "failed" => ProgressStatus::Failed,
            _ => ProgressStatus::Unknown(value),
        }
    }
}

impl From<ProgressStatus> for String {
    fn from(status: ProgressStatus) -> Self {
        match status {
            ProgressStatus::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status update about one job, routed to the owning user's connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProgressEvent {
    #[validate(length(min = 1))]
    pub image_id: String,
    #[validate(length(min = 1))]
    pub user_id: UserId,
    pub filename: String,
    /// Completion percentage.
    #[validate(range(min = 0, max = 100))]
    pub progress: i64,
    pub status: ProgressStatus,
}

/// Why a progress payload was rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed progress payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid progress payload: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl ProgressEvent {
    /// Parse and validate a raw channel payload.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let event: ProgressEvent = serde_json::from_str(payload)?;
        event.validate()?;
        Ok(event)
    }

    /// Serialize for delivery to a client.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
