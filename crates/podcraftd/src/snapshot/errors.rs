use std::io;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use thiserror::Error;

use super::SnapshotId;
use crate::world::WorldError;

/// Failures while walking, copying or hashing a tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Directory traversal failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    /// A filesystem step failed.
    #[error("failed to {action} '{path}': {source}")]
    Io {
        /// Step that failed.
        action: &'static str,
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The tree holds a name that is not UTF-8.
    #[error("path '{}' is not valid UTF-8", path.display())]
    NonUtf8Path {
        /// Offending path.
        path: PathBuf,
    },
    /// Metadata could not be encoded.
    #[error("failed to encode snapshot metadata: {0}")]
    Encode(#[source] serde_json::Error),
    /// The operation was cancelled between files.
    #[error("cancelled")]
    Cancelled,
}

/// Errors raised by [`super::SnapshotEngine`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot root could not be created or read.
    #[error("snapshot directory '{path}' is unusable: {source}")]
    Root {
        /// Snapshot root.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Copying the world into a new snapshot failed.
    #[error("capture of snapshot {id} failed: {source}")]
    CaptureFailure {
        /// Snapshot that was being assembled.
        id: SnapshotId,
        /// What went wrong.
        #[source]
        source: TreeError,
    },
    /// No published snapshot has this id.
    #[error("snapshot {id} does not exist")]
    NotFound {
        /// Requested id.
        id: SnapshotId,
    },
    /// The snapshot failed its integrity check.
    #[error("snapshot {id} is corrupt: {reason}")]
    CorruptSnapshot {
        /// Snapshot checked.
        id: SnapshotId,
        /// Mismatch or read failure.
        reason: String,
    },
    /// Restore was attempted without a stopped server.
    #[error("restore requires the server to be stopped")]
    ProcessRunning,
    /// Copying a snapshot back beside the world failed.
    #[error("restore of snapshot {id} failed: {source}")]
    RestoreFailure {
        /// Snapshot being restored.
        id: SnapshotId,
        /// What went wrong.
        #[source]
        source: TreeError,
    },
    /// The staged world could not be swapped in.
    #[error("restore of snapshot {id} failed: {source}")]
    Swap {
        /// Snapshot being restored.
        id: SnapshotId,
        /// Swap failure.
        #[source]
        source: WorldError,
    },
    /// Cancelled before the publish or swap step.
    #[error("snapshot {id} operation was cancelled")]
    Cancelled {
        /// Snapshot that was abandoned.
        id: SnapshotId,
    },
}
