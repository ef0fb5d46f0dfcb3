use std::io;
use std::time::Duration;

use thiserror::Error;

use super::ProcessPhase;

/// Errors raised by [`super::ProcessHandle`].
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A server is already starting, running or stopping.
    #[error("server is already {phase}")]
    AlreadyRunning {
        /// Phase that refused the start.
        phase: ProcessPhase,
    },
    /// The executable could not be spawned.
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailure {
        /// Program that failed to launch.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The server never answered a health probe.
    #[error("server did not become healthy within {}s: {reason}", timeout.as_secs())]
    HealthTimeout {
        /// Startup bound that expired.
        timeout: Duration,
        /// Last probe failure or the early exit status.
        reason: String,
    },
    /// The server outlived both SIGTERM and SIGKILL.
    #[error("server pid {pid} did not exit within {}s of being killed", waited.as_secs())]
    Timeout {
        /// Process that would not exit.
        pid: u32,
        /// Time waited after the kill.
        waited: Duration,
    },
}
