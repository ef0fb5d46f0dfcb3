//! Supervision of the game server process.

mod errors;
mod handle;
mod launcher;
mod phase;
mod probe;

pub use errors::ProcessError;
pub use handle::{ProcessHandle, ProcessTiming};
pub use launcher::{ChildExit, CommandLauncher, LaunchSpec, ServerChild, ServerLauncher};
pub use phase::{HealthCheck, ProcessPhase, ProcessStatus};
pub use probe::{HealthProbe, PingError, ProbeTarget, ServerListPing, ServerReport};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
