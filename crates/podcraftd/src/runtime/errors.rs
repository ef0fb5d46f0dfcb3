//! Why the daemon failed to come up or to shut down cleanly.

use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use ortho_config::OrthoError;
use podcraft_config::{RuntimePathsError, SocketPreparationError};
use thiserror::Error;

use super::shutdown::ShutdownError;
use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

/// Errors returned by [`super::run_daemon`].
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Loader error.
        #[from]
        source: Arc<OrthoError>,
    },
    /// The control socket directory could not be prepared.
    #[error("failed to prepare control socket directory: {source}")]
    Socket {
        /// Filesystem error.
        #[from]
        source: SocketPreparationError,
    },
    /// The runtime directory could not be derived or created.
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    /// Another daemon owns the runtime directory.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded by the owner.
        pid: u32,
    },
    /// The owner recorded in a leftover pid file could not be probed.
    #[error("failed to check whether pid {pid} is alive: {source}")]
    CheckProcess {
        /// Recorded PID.
        pid: u32,
        /// OS error.
        #[source]
        source: Errno,
    },
    /// A lock, pid or health file could not be created, written or removed.
    #[error("failed to {action} runtime file '{path}': {source}")]
    RuntimeFile {
        /// What was being done: `create`, `write` or `remove`.
        action: &'static str,
        /// Affected file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The health file body could not be produced.
    #[error("failed to encode health file: {0}")]
    HealthEncode(#[from] serde_json::Error),
    /// The health timestamp could not be formatted.
    #[error("failed to format health timestamp: {0}")]
    Clock(#[from] time::error::Format),
    /// Health was published before the pid.
    #[error("pid must be written before updating health state")]
    MissingPid,
    /// A worker thread could not be spawned.
    #[error("failed to spawn {role} thread: {source}")]
    Thread {
        /// Which worker failed to start.
        role: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Termination signals could not be observed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// Recovery or assembly of the lifecycle failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Bootstrap error.
        #[from]
        source: BootstrapError,
    },
    /// The control socket could not be served.
    #[error("control socket failed: {source}")]
    Listener {
        /// Listener error.
        #[from]
        source: ListenerError,
    },
}
