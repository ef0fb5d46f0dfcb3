//! Snapshot identifiers and the `snapshot.json` record.

use std::fmt;
use std::str::FromStr;

use podcraft_config::SnapshotPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sequence number of a snapshot, rendered zero-padded so directory names
/// sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// Wraps a sequence number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Following id.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// The text was not a snapshot id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a snapshot id")]
pub struct SnapshotIdError(String);

impl FromStr for SnapshotId {
    type Err = SnapshotIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() || !input.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(SnapshotIdError(input.to_owned()));
        }
        input
            .parse()
            .map(Self)
            .map_err(|_| SnapshotIdError(input.to_owned()))
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = SnapshotIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.to_string()
    }
}

/// Lifecycle of a snapshot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Being assembled in staging.
    Pending,
    /// Published and immutable.
    Complete,
    /// Failed capture or unreadable record.
    Corrupt,
}

/// Contents of `snapshot.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Sequence number.
    pub id: SnapshotId,
    /// RFC 3339 time the capture began.
    pub created_at: String,
    /// Record status.
    pub status: SnapshotStatus,
    /// How the world was held still.
    pub policy: SnapshotPolicy,
    /// Total bytes of regular files captured.
    pub size_bytes: u64,
    /// Number of regular files and symlinks captured.
    pub file_count: u64,
    /// Hex SHA-256 over the captured tree.
    pub checksum: String,
}

impl SnapshotMeta {
    pub(crate) fn pending(id: SnapshotId, created_at: String, policy: SnapshotPolicy) -> Self {
        Self {
            id,
            created_at,
            status: SnapshotStatus::Pending,
            policy,
            size_bytes: 0,
            file_count: 0,
            checksum: String::new(),
        }
    }

    /// Placeholder listed for a directory whose record cannot be read.
    pub(crate) fn unreadable(id: SnapshotId) -> Self {
        Self {
            status: SnapshotStatus::Corrupt,
            ..Self::pending(id, String::new(), SnapshotPolicy::default())
        }
    }
}
