//! Point-in-time captures of the world directory.
//!
//! On disk every snapshot is `<root>/<id>/snapshot.json` plus
//! `<root>/<id>/world/`. Captures are assembled under `.staging-<id>` and
//! published by renaming the staging directory, so a listing never shows a
//! half-written snapshot.

mod engine;
mod errors;
mod metadata;
mod tree;

pub use engine::{SnapshotEngine, Snapshots};
pub use errors::{SnapshotError, TreeError};
pub use metadata::{SnapshotId, SnapshotIdError, SnapshotMeta, SnapshotStatus};

pub(crate) const SNAPSHOT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::snapshot");
