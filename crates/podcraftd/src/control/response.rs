use std::io::Write;

use serde::Serialize;

use super::ControlError;
use crate::coordinator::{IntentDetail, IntentResult, LifecycleError};

/// Error description sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable error kind, such as `process_running`.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl From<&LifecycleError> for ErrorBody {
    fn from(error: &LifecycleError) -> Self {
        Self {
            kind: error.kind().as_str(),
            message: error.to_string(),
        }
    }
}

/// The single response line.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlResponse {
    /// Queued without waiting.
    Accepted,
    /// Finished successfully.
    Completed {
        /// Result payload.
        detail: IntentDetail,
    },
    /// Refused before anything changed.
    Rejected {
        /// Why.
        error: ErrorBody,
    },
    /// Attempted and failed.
    Failed {
        /// Why.
        error: ErrorBody,
    },
}

impl ControlResponse {
    /// Response for a request that never reached the coordinator.
    #[must_use]
    pub fn bad_request(error: &ControlError) -> Self {
        Self::Rejected {
            error: ErrorBody {
                kind: "bad_request",
                message: error.to_string(),
            },
        }
    }
}

impl From<IntentResult> for ControlResponse {
    fn from(result: IntentResult) -> Self {
        match result {
            IntentResult::Accepted => Self::Accepted,
            IntentResult::Completed(detail) => Self::Completed { detail },
            IntentResult::Rejected(error) => Self::Rejected {
                error: ErrorBody::from(&error),
            },
            IntentResult::Failed(error) => Self::Failed {
                error: ErrorBody::from(&error),
            },
        }
    }
}

/// Writes JSONL responses.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one response line and flushes.
    pub fn write(&mut self, response: &ControlResponse) -> Result<(), ControlError> {
        serde_json::to_writer(&mut self.writer, response).map_err(ControlError::Encode)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
