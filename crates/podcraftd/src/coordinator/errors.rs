use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config_gate::ConfigGateError;
use crate::process::{ProcessError, ProcessPhase};
use crate::rcon_bridge::BridgeError;
use crate::snapshot::SnapshotError;

/// Stable, serialisable classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AlreadyRunning,
    SpawnFailure,
    HealthTimeout,
    ProcessRunning,
    CaptureFailure,
    RestoreFailure,
    CorruptSnapshot,
    SnapshotNotFound,
    UnknownOption,
    ValidationError,
    ConfigPersist,
    Timeout,
    Cancelled,
    Unavailable,
}

impl ErrorKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyRunning => "already_running",
            Self::SpawnFailure => "spawn_failure",
            Self::HealthTimeout => "health_timeout",
            Self::ProcessRunning => "process_running",
            Self::CaptureFailure => "capture_failure",
            Self::RestoreFailure => "restore_failure",
            Self::CorruptSnapshot => "corrupt_snapshot",
            Self::SnapshotNotFound => "snapshot_not_found",
            Self::UnknownOption => "unknown_option",
            Self::ValidationError => "validation_error",
            Self::ConfigPersist => "config_persist",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Unavailable => "unavailable",
        }
    }

    /// Whether an intent failing with this kind was refused before it
    /// changed anything.
    #[must_use]
    pub const fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning
                | Self::ProcessRunning
                | Self::SnapshotNotFound
                | Self::UnknownOption
                | Self::ValidationError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the lifecycle coordinator.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Process supervision failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// Snapshot capture, verification or restore failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// A configuration write was refused or could not be stored.
    #[error(transparent)]
    Config(#[from] ConfigGateError),
    /// World replacement was requested while the server exists.
    #[error("server is {phase}; stop it before restoring")]
    ProcessRunning {
        /// Phase that refused the restore.
        phase: ProcessPhase,
    },
    /// The running server could not be told to flush for a hot capture.
    #[error("failed to suspend world saving: {source}")]
    Flush {
        /// RCON failure.
        #[source]
        source: BridgeError,
    },
    /// The intent was cancelled before it started.
    #[error("intent was cancelled before it started")]
    Cancelled,
    /// The coordinator has shut down.
    #[error("lifecycle coordinator is not running")]
    Unavailable,
}

impl LifecycleError {
    /// Classification used on the wire.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Process(error) => match error {
                ProcessError::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
                ProcessError::SpawnFailure { .. } => ErrorKind::SpawnFailure,
                ProcessError::HealthTimeout { .. } => ErrorKind::HealthTimeout,
                ProcessError::Timeout { .. } => ErrorKind::Timeout,
            },
            Self::Snapshot(error) => match error {
                SnapshotError::Root { .. } | SnapshotError::CaptureFailure { .. } => {
                    ErrorKind::CaptureFailure
                }
                SnapshotError::RestoreFailure { .. } | SnapshotError::Swap { .. } => {
                    ErrorKind::RestoreFailure
                }
                SnapshotError::NotFound { .. } => ErrorKind::SnapshotNotFound,
                SnapshotError::CorruptSnapshot { .. } => ErrorKind::CorruptSnapshot,
                SnapshotError::ProcessRunning => ErrorKind::ProcessRunning,
                SnapshotError::Cancelled { .. } => ErrorKind::Cancelled,
            },
            Self::Config(error) => match error {
                ConfigGateError::UnknownOption { .. } => ErrorKind::UnknownOption,
                ConfigGateError::Validation { .. } => ErrorKind::ValidationError,
                ConfigGateError::Read { .. } | ConfigGateError::Persist { .. } => {
                    ErrorKind::ConfigPersist
                }
            },
            Self::ProcessRunning { .. } => ErrorKind::ProcessRunning,
            Self::Flush { .. } => ErrorKind::CaptureFailure,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unavailable => ErrorKind::Unavailable,
        }
    }
}
