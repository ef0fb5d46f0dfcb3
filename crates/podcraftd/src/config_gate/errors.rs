use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised by [`super::ConfigGate`].
#[derive(Debug, Error)]
pub enum ConfigGateError {
    /// The key is not a recognised server option.
    #[error("unknown server option '{key}'")]
    UnknownOption {
        /// Key as supplied by the caller.
        key: String,
    },
    /// The value does not satisfy the option's rule.
    #[error("invalid value '{value}' for '{key}': {reason}")]
    Validation {
        /// Canonical option key.
        key: String,
        /// Rejected value.
        value: String,
        /// What the option expects.
        reason: String,
    },
    /// The properties file exists but could not be read.
    #[error("failed to read server properties '{path}': {source}")]
    Read {
        /// Properties file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The updated file could not be written.
    #[error("failed to persist server properties '{path}': {source}")]
    Persist {
        /// Properties file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
