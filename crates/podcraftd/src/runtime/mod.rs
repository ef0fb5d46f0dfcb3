//! Daemon process runtime: single-instance guard, signals and launch.

mod errors;
mod guard;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use guard::HealthState;
pub use launch::run_daemon;
#[cfg(test)]
pub(crate) use launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");
