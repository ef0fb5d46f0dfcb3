use std::io;

use thiserror::Error;

/// Errors raised while serving one control connection.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The request line is not a valid control request.
    #[error("malformed request: {message}")]
    Malformed {
        /// What was wrong.
        message: String,
        /// JSON decoding failure, when there was one.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// Reading or writing the stream failed.
    #[error("control connection IO error: {0}")]
    Io(#[from] io::Error),
    /// The response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ControlError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn from_json(error: serde_json::Error) -> Self {
        Self::Malformed {
            message: error.to_string(),
            source: Some(error),
        }
    }
}
