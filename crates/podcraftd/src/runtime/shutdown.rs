//! Waiting for the signal that ends the daemon.

use std::io;
use std::sync::{Mutex, PoisonError};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::RUNTIME_TARGET;

/// Signals that stop the daemon. Container runtimes send SIGTERM on `stop`.
const TERMINATING: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Blocks the runtime until it should shut down.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once shutdown was requested.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Failure to observe termination signals.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The process-wide handlers could not be registered.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Termination signals of the daemon process.
///
/// Handlers are registered on construction, so a signal that arrives while
/// the daemon is still recovering its mounts is queued rather than lost.
pub struct SystemShutdownSignal {
    signals: Mutex<Signals>,
}

impl SystemShutdownSignal {
    /// Registers handlers for SIGTERM, SIGINT, SIGQUIT and SIGHUP.
    pub fn install() -> Result<Self, ShutdownError> {
        let signals = Signals::new(TERMINATING).map_err(|source| ShutdownError::Install { source })?;
        Ok(Self {
            signals: Mutex::new(signals),
        })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(signal) = signals.forever().next() {
            info!(target: RUNTIME_TARGET, signal, "termination signal received");
        }
        Ok(())
    }
}
