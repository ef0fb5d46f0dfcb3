//! Ownership of the live world directory.
//!
//! The world may only be touched by the server process or by whoever holds a
//! [`QuiesceToken`]. Replacing the tree is a method on a `Stopped` token, so
//! restore cannot be written without first proving the server is down.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const WORLD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::world");

/// Why the world is being held still.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuiesceMode {
    /// The server process is not running.
    Stopped,
    /// The server is running with saving suspended.
    Paused,
}

/// Errors raised by [`WorldStore`].
#[derive(Debug, Error)]
pub enum WorldError {
    /// The world directory could not be created.
    #[error("failed to create world directory '{path}': {source}")]
    Create {
        /// World directory.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The world path ends in `/` or `..` and names no directory.
    #[error("world path '{path}' does not name a directory")]
    Unnamed {
        /// World directory.
        path: Utf8PathBuf,
    },
    /// Only a `Stopped` token may replace the world.
    #[error("world replacement requires a stopped server")]
    NotStopped,
    /// A step of the swap failed.
    #[error("failed to {action} '{path}': {source}")]
    Swap {
        /// Step that failed.
        action: &'static str,
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// What [`WorldStore::recover`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No interrupted swap.
    Clean,
    /// The new tree was already in place; leftovers were removed.
    Completed,
    /// The new tree never landed; the previous tree was put back.
    RolledBack,
}

/// The live world directory plus its exclusion lock.
#[derive(Debug)]
pub struct WorldStore {
    root: Utf8PathBuf,
    parent: Utf8PathBuf,
    name: String,
    lock: Mutex<()>,
    quiesced: AtomicBool,
}

impl WorldStore {
    /// Takes ownership of `root`, creating it when absent unless a swap was
    /// interrupted.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, WorldError> {
        let root = root.into();
        let name = root
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| WorldError::Unnamed { path: root.clone() })?;
        let parent = parent_dir(&root);
        let store = Self {
            root,
            parent,
            name,
            lock: Mutex::new(()),
            quiesced: AtomicBool::new(false),
        };
        // A missing root beside a journal is evidence for `recover`.
        if !store.journal_path().exists() {
            fs::create_dir_all(&store.root).map_err(|source| WorldError::Create {
                path: store.root.clone(),
                source,
            })?;
        }
        Ok(store)
    }

    /// Root of the live tree. Callers must treat it as read-only.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    /// Whether a token is currently held.
    #[must_use]
    pub fn is_quiesced(&self) -> bool {
        self.quiesced.load(Ordering::SeqCst)
    }

    /// Acquires exclusive access, blocking while another token is held.
    pub fn quiesce(&self, mode: QuiesceMode) -> QuiesceToken<'_> {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.quiesced.store(true, Ordering::SeqCst);
        QuiesceToken {
            store: self,
            mode,
            _guard: guard,
        }
    }

    /// Finishes or undoes a swap interrupted by a crash.
    pub fn recover(&self) -> Result<Recovery, WorldError> {
        let _token = self.quiesce(QuiesceMode::Stopped);
        let journal = self.journal_path();
        let previous = self.previous_path();
        let outcome = if journal.exists() {
            if self.root.exists() {
                remove_tree(&previous)?;
                Recovery::Completed
            } else {
                if previous.exists() {
                    rename(&previous, &self.root, "restore previous world")?;
                }
                Recovery::RolledBack
            }
        } else {
            if previous.exists() {
                remove_tree(&previous)?;
            }
            Recovery::Clean
        };
        remove_file(&journal)?;
        remove_tree(&self.staging_path())?;
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|source| WorldError::Create {
                path: self.root.clone(),
                source,
            })?;
        }
        if outcome != Recovery::Clean {
            info!(target: WORLD_TARGET, world = %self.root, ?outcome, "recovered interrupted world swap");
        }
        Ok(outcome)
    }

    fn sibling(&self, suffix: &str) -> Utf8PathBuf {
        self.parent.join(format!(".{}.{suffix}", self.name))
    }

    fn staging_path(&self) -> Utf8PathBuf {
        self.sibling("incoming")
    }

    fn previous_path(&self) -> Utf8PathBuf {
        self.sibling("previous")
    }

    fn journal_path(&self) -> Utf8PathBuf {
        self.sibling("swap")
    }
}

/// Exclusive hold on the world directory. Released on drop.
#[derive(Debug)]
pub struct QuiesceToken<'a> {
    store: &'a WorldStore,
    mode: QuiesceMode,
    _guard: MutexGuard<'a, ()>,
}

impl QuiesceToken<'_> {
    /// Mode the token was acquired with.
    #[must_use]
    pub const fn mode(&self) -> QuiesceMode {
        self.mode
    }

    /// Root of the world tree.
    #[must_use]
    pub fn world(&self) -> &Utf8Path {
        &self.store.root
    }

    /// Empty directory beside the world where a replacement is assembled.
    ///
    /// It sits on the same filesystem as the world so the swap is a rename.
    pub fn prepare_staging(&self) -> Result<Utf8PathBuf, WorldError> {
        let staging = self.store.staging_path();
        remove_tree(&staging)?;
        fs::create_dir_all(&staging).map_err(|source| WorldError::Swap {
            action: "create staging directory",
            path: staging.clone(),
            source,
        })?;
        Ok(staging)
    }

    /// Removes a staging directory that will not be swapped in.
    pub fn discard_staging(&self) -> Result<(), WorldError> {
        remove_tree(&self.store.staging_path())
    }

    /// Replaces the world with the staged tree.
    ///
    /// The journal is written before the first rename and removed after the
    /// second, so [`WorldStore::recover`] always finds either the old or the
    /// new tree.
    pub fn replace_world(&self, staged: &Utf8Path) -> Result<(), WorldError> {
        if self.mode != QuiesceMode::Stopped {
            return Err(WorldError::NotStopped);
        }
        let store = self.store;
        let previous = store.previous_path();
        let journal = store.journal_path();
        remove_tree(&previous)?;
        fs::write(&journal, staged.as_str()).map_err(|source| WorldError::Swap {
            action: "write swap journal",
            path: journal.clone(),
            source,
        })?;

        if store.root.exists() {
            rename(&store.root, &previous, "move world aside")?;
        }
        if let Err(error) = rename(staged, &store.root, "move staged world into place") {
            if previous.exists() {
                if let Err(undo) = rename(&previous, &store.root, "restore previous world") {
                    warn!(target: WORLD_TARGET, error = %undo, "world left for recovery");
                    return Err(error);
                }
            }
            remove_file(&journal)?;
            return Err(error);
        }

        remove_file(&journal)?;
        if let Err(error) = remove_tree(&previous) {
            warn!(target: WORLD_TARGET, error = %error, "previous world left behind");
        }
        info!(target: WORLD_TARGET, world = %store.root, "world replaced");
        Ok(())
    }
}

impl Drop for QuiesceToken<'_> {
    fn drop(&mut self) {
        self.store.quiesced.store(false, Ordering::SeqCst);
    }
}

/// Directory holding `root`; a bare name lives in the working directory.
fn parent_dir(root: &Utf8Path) -> Utf8PathBuf {
    root.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf)
}

fn rename(from: &Utf8Path, to: &Utf8Path, action: &'static str) -> Result<(), WorldError> {
    fs::rename(from, to).map_err(|source| WorldError::Swap {
        action,
        path: from.to_path_buf(),
        source,
    })
}

fn remove_tree(path: &Utf8Path) -> Result<(), WorldError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(WorldError::Swap {
            action: "remove",
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn remove_file(path: &Utf8Path) -> Result<(), WorldError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(WorldError::Swap {
            action: "remove",
            path: path.to_path_buf(),
            source,
        }),
    }
}
