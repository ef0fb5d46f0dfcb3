use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use podcraft_config::SnapshotPolicy;
use tracing::{info, warn};

use super::SNAPSHOT_TARGET;
use super::errors::{SnapshotError, TreeError};
use super::metadata::{SnapshotId, SnapshotMeta, SnapshotStatus};
use super::tree::{copy_tree, digest_tree};
use crate::cancel::CancelToken;
use crate::clock::now_rfc3339;
use crate::world::{QuiesceMode, QuiesceToken};

const META_FILE: &str = "snapshot.json";
const WORLD_DIR: &str = "world";
const STAGING_PREFIX: &str = ".staging-";

/// Creates, lists, verifies and restores snapshots under one root.
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    root: Utf8PathBuf,
}

impl SnapshotEngine {
    /// Uses `root`, creating it when absent.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, SnapshotError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| SnapshotError::Root {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Snapshot root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Captures the world held by `token`.
    ///
    /// The copy is hashed, recorded as `complete` and published with one
    /// rename. Any failure before the rename marks the staging record
    /// `corrupt` and removes the staging tree.
    pub fn create(
        &self,
        token: &QuiesceToken<'_>,
        policy: SnapshotPolicy,
        cancel: &CancelToken,
    ) -> Result<SnapshotMeta, SnapshotError> {
        let id = self.next_id()?;
        let staging = self.root.join(format!("{STAGING_PREFIX}{id}"));
        info!(target: SNAPSHOT_TARGET, %id, %policy, world = %token.world(), "capturing snapshot");

        match self.assemble(id, &staging, token.world(), policy, cancel) {
            Ok(meta) => {
                let published = self.snapshot_dir(id);
                fs::rename(&staging, &published).map_err(|source| {
                    self.abandon(&staging, id);
                    SnapshotError::CaptureFailure {
                        id,
                        source: TreeError::Io {
                            action: "publish snapshot to",
                            path: published.clone(),
                            source,
                        },
                    }
                })?;
                info!(
                    target: SNAPSHOT_TARGET,
                    %id,
                    files = meta.file_count,
                    bytes = meta.size_bytes,
                    "snapshot published"
                );
                Ok(meta)
            }
            Err(error) => {
                self.abandon(&staging, id);
                Err(match error {
                    TreeError::Cancelled => SnapshotError::Cancelled { id },
                    source => SnapshotError::CaptureFailure { id, source },
                })
            }
        }
    }

    fn assemble(
        &self,
        id: SnapshotId,
        staging: &Utf8Path,
        world: &Utf8Path,
        policy: SnapshotPolicy,
        cancel: &CancelToken,
    ) -> Result<SnapshotMeta, TreeError> {
        let created_at = now_rfc3339().map_err(|error| TreeError::Io {
            action: "timestamp",
            path: staging.to_path_buf(),
            source: io::Error::other(error),
        })?;
        let target = staging.join(WORLD_DIR);
        fs::create_dir_all(&target).map_err(|source| TreeError::Io {
            action: "create staging directory",
            path: target.clone(),
            source,
        })?;
        let mut meta = SnapshotMeta::pending(id, created_at, policy);
        write_meta(staging, &meta)?;

        copy_tree(world, &target, cancel)?;
        let digest = digest_tree(&target, cancel)?;
        if cancel.is_cancelled() {
            return Err(TreeError::Cancelled);
        }

        meta.status = SnapshotStatus::Complete;
        meta.checksum = digest.checksum;
        meta.size_bytes = digest.size_bytes;
        meta.file_count = digest.file_count;
        write_meta(staging, &meta)?;
        Ok(meta)
    }

    fn abandon(&self, staging: &Utf8Path, id: SnapshotId) {
        if let Ok(mut meta) = read_meta(staging) {
            meta.status = SnapshotStatus::Corrupt;
            if let Err(error) = write_meta(staging, &meta) {
                warn!(target: SNAPSHOT_TARGET, %id, error = %error, "failed to mark staging corrupt");
            }
        }
        if let Err(error) = fs::remove_dir_all(staging) {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(target: SNAPSHOT_TARGET, %id, error = %error, "failed to remove staging directory");
            }
        }
    }

    /// Published snapshots in creation order.
    ///
    /// Directory names are read up front; each record is read as the
    /// iterator reaches it. Calling `list` again starts a fresh pass.
    pub fn list(&self) -> Result<Snapshots, SnapshotError> {
        let ids = self.published_ids()?;
        Ok(Snapshots {
            root: self.root.clone(),
            ids: ids.into_iter(),
        })
    }

    /// Record of one published snapshot.
    pub fn get(&self, id: SnapshotId) -> Result<SnapshotMeta, SnapshotError> {
        let dir = self.snapshot_dir(id);
        if !dir.is_dir() {
            return Err(SnapshotError::NotFound { id });
        }
        read_meta(&dir).map_err(|error| SnapshotError::CorruptSnapshot {
            id,
            reason: format!("unreadable metadata: {error}"),
        })
    }

    /// Recomputes the checksum of a published snapshot.
    pub fn verify(&self, id: SnapshotId, cancel: &CancelToken) -> Result<SnapshotMeta, SnapshotError> {
        let meta = self.get(id)?;
        if meta.status != SnapshotStatus::Complete {
            return Err(SnapshotError::CorruptSnapshot {
                id,
                reason: format!("status is {:?}", meta.status).to_lowercase(),
            });
        }
        let world = self.snapshot_dir(id).join(WORLD_DIR);
        let digest = digest_tree(&world, cancel).map_err(|error| match error {
            TreeError::Cancelled => SnapshotError::Cancelled { id },
            other => SnapshotError::CorruptSnapshot {
                id,
                reason: other.to_string(),
            },
        })?;
        check_digest(id, &meta, &digest.checksum)?;
        Ok(meta)
    }

    /// Replaces the world with snapshot `id`.
    ///
    /// The snapshot is verified before anything is written and the staged
    /// copy is verified again before the swap. Cancellation is honoured up
    /// to the swap, never during it.
    pub fn restore(
        &self,
        id: SnapshotId,
        token: &QuiesceToken<'_>,
        cancel: &CancelToken,
    ) -> Result<SnapshotMeta, SnapshotError> {
        if token.mode() != QuiesceMode::Stopped {
            return Err(SnapshotError::ProcessRunning);
        }
        let meta = self.verify(id, cancel)?;
        info!(target: SNAPSHOT_TARGET, %id, world = %token.world(), "restoring snapshot");

        let staging = token
            .prepare_staging()
            .map_err(|source| SnapshotError::Swap { id, source })?;
        let staged = copy_tree(&self.snapshot_dir(id).join(WORLD_DIR), &staging, cancel)
            .and_then(|()| digest_tree(&staging, cancel))
            .and_then(|digest| {
                if cancel.is_cancelled() {
                    Err(TreeError::Cancelled)
                } else {
                    Ok(digest)
                }
            });
        let digest = match staged {
            Ok(digest) => digest,
            Err(error) => {
                discard(token, id);
                return Err(match error {
                    TreeError::Cancelled => SnapshotError::Cancelled { id },
                    source => SnapshotError::RestoreFailure { id, source },
                });
            }
        };
        if let Err(error) = check_digest(id, &meta, &digest.checksum) {
            discard(token, id);
            return Err(error);
        }

        token
            .replace_world(&staging)
            .map_err(|source| SnapshotError::Swap { id, source })?;
        info!(target: SNAPSHOT_TARGET, %id, "snapshot restored");
        Ok(meta)
    }

    /// Deletes the oldest complete snapshots so at most `keep` remain.
    ///
    /// `keep == 0` keeps everything. Corrupt snapshots are left for an
    /// operator to inspect.
    pub fn prune(&self, keep: usize) -> Result<Vec<SnapshotId>, SnapshotError> {
        if keep == 0 {
            return Ok(Vec::new());
        }
        let complete: Vec<SnapshotId> = self
            .list()?
            .filter(|meta| meta.status == SnapshotStatus::Complete)
            .map(|meta| meta.id)
            .collect();
        let excess = complete.len().saturating_sub(keep);
        let mut removed = Vec::with_capacity(excess);
        for id in complete.into_iter().take(excess) {
            let dir = self.snapshot_dir(id);
            fs::remove_dir_all(&dir).map_err(|source| SnapshotError::Root { path: dir, source })?;
            info!(target: SNAPSHOT_TARGET, %id, "pruned snapshot");
            removed.push(id);
        }
        Ok(removed)
    }

    /// Removes staging directories left by an interrupted capture.
    pub fn sweep_staging(&self) -> Result<usize, SnapshotError> {
        let mut swept = 0;
        for entry in self.read_root()? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !name.starts_with(STAGING_PREFIX) {
                continue;
            }
            let path = self.root.join(&name);
            fs::remove_dir_all(&path).map_err(|source| SnapshotError::Root { path, source })?;
            warn!(target: SNAPSHOT_TARGET, staging = %name, "removed abandoned staging directory");
            swept += 1;
        }
        Ok(swept)
    }

    fn next_id(&self) -> Result<SnapshotId, SnapshotError> {
        let mut highest = SnapshotId::new(0);
        for entry in self.read_root()? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let candidate = name.strip_prefix(STAGING_PREFIX).unwrap_or(&name);
            if let Ok(id) = candidate.parse::<SnapshotId>() {
                highest = highest.max(id);
            }
        }
        Ok(highest.next())
    }

    fn published_ids(&self) -> Result<Vec<SnapshotId>, SnapshotError> {
        let mut ids: Vec<SnapshotId> = self
            .read_root()?
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn read_root(&self) -> Result<impl Iterator<Item = fs::DirEntry>, SnapshotError> {
        let entries = fs::read_dir(&self.root).map_err(|source| SnapshotError::Root {
            path: self.root.clone(),
            source,
        })?;
        Ok(entries.filter_map(Result::ok))
    }

    fn snapshot_dir(&self, id: SnapshotId) -> Utf8PathBuf {
        self.root.join(id.to_string())
    }
}

/// Lazy iterator returned by [`SnapshotEngine::list`].
#[derive(Debug)]
pub struct Snapshots {
    root: Utf8PathBuf,
    ids: std::vec::IntoIter<SnapshotId>,
}

impl Iterator for Snapshots {
    type Item = SnapshotMeta;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        let dir = self.root.join(id.to_string());
        Some(match read_meta(&dir) {
            Ok(meta) if meta.id == id => meta,
            Ok(_) | Err(_) => SnapshotMeta::unreadable(id),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

fn check_digest(id: SnapshotId, meta: &SnapshotMeta, actual: &str) -> Result<(), SnapshotError> {
    if actual == meta.checksum {
        Ok(())
    } else {
        Err(SnapshotError::CorruptSnapshot {
            id,
            reason: format!("checksum mismatch: recorded {}, found {actual}", meta.checksum),
        })
    }
}

fn discard(token: &QuiesceToken<'_>, id: SnapshotId) {
    if let Err(error) = token.discard_staging() {
        warn!(target: SNAPSHOT_TARGET, %id, error = %error, "failed to remove restore staging");
    }
}

fn read_meta(dir: &Utf8Path) -> Result<SnapshotMeta, TreeError> {
    let path = dir.join(META_FILE);
    let bytes = fs::read(&path).map_err(|source| TreeError::Io {
        action: "read",
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|error| TreeError::Io {
        action: "decode",
        path,
        source: io::Error::new(io::ErrorKind::InvalidData, error),
    })
}

fn write_meta(dir: &Utf8Path, meta: &SnapshotMeta) -> Result<(), TreeError> {
    let path = dir.join(META_FILE);
    let mut bytes = serde_json::to_vec_pretty(meta).map_err(TreeError::Encode)?;
    bytes.push(b'\n');
    let io_error = |source: io::Error| TreeError::Io {
        action: "write",
        path: path.clone(),
        source,
    };
    let mut file = fs::File::create(&path).map_err(io_error)?;
    file.write_all(&bytes).map_err(io_error)?;
    file.sync_all().map_err(io_error)
}
