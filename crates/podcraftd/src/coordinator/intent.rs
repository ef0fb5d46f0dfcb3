//! Requests accepted by the coordinator and what they produce.

use serde::{Deserialize, Serialize};

use super::LifecycleError;
use crate::config_gate::{ServerConfig, WriteOutcome};
use crate::process::ProcessStatus;
use crate::snapshot::{SnapshotId, SnapshotMeta};

const fn graceful_by_default() -> bool {
    true
}

/// One externally requested lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleIntent {
    /// Start the server with the current configuration.
    Start,
    /// Stop the server; `graceful: false` kills it outright.
    Stop {
        /// Send SIGTERM and wait before escalating.
        #[serde(default = "graceful_by_default")]
        graceful: bool,
    },
    /// Capture the world.
    Snapshot,
    /// Replace the world with a snapshot.
    Restore {
        /// Snapshot to restore.
        id: SnapshotId,
    },
    /// Change one server option.
    SetConfig {
        /// Option key.
        key: String,
        /// New value.
        value: String,
    },
    /// Stop then start, picking up pending configuration.
    Restart,
    /// Report the process status.
    Status,
    /// List published snapshots.
    ListSnapshots,
    /// Report the server configuration.
    ReadConfig,
}

impl LifecycleIntent {
    /// Stable name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop { .. } => "stop",
            Self::Snapshot => "snapshot",
            Self::Restore { .. } => "restore",
            Self::SetConfig { .. } => "set_config",
            Self::Restart => "restart",
            Self::Status => "status",
            Self::ListSnapshots => "list_snapshots",
            Self::ReadConfig => "read_config",
        }
    }

    /// Whether a ticket may cancel this intent while it runs.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Snapshot | Self::Restore { .. })
    }
}

/// Payload of a completed intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentDetail {
    /// Process status after the intent.
    Process(ProcessStatus),
    /// Newly published snapshot.
    Snapshot(SnapshotMeta),
    /// Snapshot the world was restored from.
    Restored(SnapshotMeta),
    /// Result of a configuration write.
    ConfigWrite(WriteOutcome),
    /// Published snapshots in creation order.
    Snapshots(Vec<SnapshotMeta>),
    /// Current server configuration.
    Config(ServerConfig),
}

/// Outcome of submitting or executing an intent.
#[derive(Debug)]
pub enum IntentResult {
    /// Queued; the final result arrives through the ticket.
    Accepted,
    /// Refused by a precondition; nothing changed.
    Rejected(LifecycleError),
    /// Done.
    Completed(IntentDetail),
    /// Attempted and failed.
    Failed(LifecycleError),
}

impl IntentResult {
    /// Sorts a finished operation into completed, rejected or failed.
    #[must_use]
    pub fn from_outcome(outcome: Result<IntentDetail, LifecycleError>) -> Self {
        match outcome {
            Ok(detail) => Self::Completed(detail),
            Err(error) if error.kind().is_rejection() => Self::Rejected(error),
            Err(error) => Self::Failed(error),
        }
    }

    /// Detail of a completed intent.
    #[must_use]
    pub const fn detail(&self) -> Option<&IntentDetail> {
        match self {
            Self::Completed(detail) => Some(detail),
            _ => None,
        }
    }

    /// Error of a rejected or failed intent.
    #[must_use]
    pub const fn error(&self) -> Option<&LifecycleError> {
        match self {
            Self::Rejected(error) | Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}
