//! Locations of the daemon's lock, pid and health files.
//!
//! The files sit next to the control socket so operators find everything the
//! daemon publishes in one directory.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::defaults::default_runtime_dir;
use crate::{Config, SocketEndpoint};

/// Runtime file locations derived from a [`Config`].
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: Utf8PathBuf,
    lock_path: Utf8PathBuf,
    pid_path: Utf8PathBuf,
    health_path: Utf8PathBuf,
}

impl RuntimePaths {
    /// Derives and creates the runtime directory.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = match config.control_socket() {
            SocketEndpoint::Unix { path } => path
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .map(Utf8Path::to_path_buf)
                .ok_or_else(|| RuntimePathsError::MissingSocketParent { path: path.clone() })?,
            SocketEndpoint::Tcp { .. } => default_runtime_dir(),
        };
        Self::in_dir(runtime_dir)
    }

    /// Uses `runtime_dir` directly, creating it when absent.
    pub fn in_dir(runtime_dir: impl Into<Utf8PathBuf>) -> Result<Self, RuntimePathsError> {
        let runtime_dir = runtime_dir.into();
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::CreateDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join("podcraftd.lock"),
            pid_path: runtime_dir.join("podcraftd.pid"),
            health_path: runtime_dir.join("podcraftd.health"),
            runtime_dir,
        })
    }

    /// Directory holding the runtime files.
    #[must_use]
    pub fn runtime_dir(&self) -> &Utf8Path {
        &self.runtime_dir
    }

    /// Lock file guarding against a second daemon.
    #[must_use]
    pub fn lock_path(&self) -> &Utf8Path {
        &self.lock_path
    }

    /// PID file.
    #[must_use]
    pub fn pid_path(&self) -> &Utf8Path {
        &self.pid_path
    }

    /// Latest published daemon health status.
    #[must_use]
    pub fn health_path(&self) -> &Utf8Path {
        &self.health_path
    }
}

/// Errors raised while deriving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The Unix socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent {
        /// Offending socket path.
        path: Utf8PathBuf,
    },
    /// The runtime directory could not be created.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
