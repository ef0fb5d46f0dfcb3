//! Lifecycle manager for a containerised game server.
//!
//! `podcraftd` owns three mounted resources: the live world directory, a
//! snapshot directory and the server's `server.properties`. It supervises the
//! server process and accepts lifecycle intents (start, stop, snapshot,
//! restore, configuration changes) over a JSONL control socket.
//!
//! Every intent is funnelled through one coordinator thread, so the
//! interlocks between components reduce to ordinary sequencing: a restore
//! needs a stopped server, a cold snapshot stops and restarts it, and a
//! configuration write is tagged with the revision the running process has
//! (or has not yet) picked up.
//!
//! Startup repairs what an interrupted run can leave behind. A half-finished
//! world swap is rolled forward or back, and abandoned snapshot staging
//! directories are removed, before the first intent is accepted.

mod bootstrap;
mod cancel;
mod clock;
mod config_gate;
mod control;
mod coordinator;
mod files;
mod health;
mod process;
mod rcon_bridge;
mod runtime;
mod scheduler;
mod snapshot;
mod telemetry;
mod transport;
mod world;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, ServerProvider, StaticConfigLoader, SystemConfigLoader,
    SystemServerProvider, bootstrap_with,
};
pub use cancel::CancelToken;
pub use config_gate::{
    ConfigGate, ConfigGateError, DEFAULT_RCON_PORT, DEFAULT_SERVER_PORT, RconAccess, ServerConfig,
    WriteEffect, WriteOutcome,
};
pub use control::{
    ControlConnectionHandler, ControlError, ControlRequest, ControlResponse, ErrorBody,
};
pub use coordinator::{
    CoordinatorHandle, ErrorKind, IntentDetail, IntentResult, Lifecycle, LifecycleCoordinator,
    LifecycleError, LifecycleIntent, LifecycleParts, Ticket,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    ChildExit, CommandLauncher, HealthCheck, HealthProbe, LaunchSpec, PingError, ProbeTarget,
    ProcessError, ProcessHandle, ProcessPhase, ProcessStatus, ProcessTiming, ServerChild,
    ServerLauncher, ServerListPing, ServerReport,
};
pub use rcon_bridge::{BridgeError, ConfigApplier, RconBridge, WorldFlusher};
pub use runtime::{
    HealthState, LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
};
pub use scheduler::SnapshotScheduler;
pub use snapshot::{
    SnapshotEngine, SnapshotError, SnapshotId, SnapshotIdError, SnapshotMeta, SnapshotStatus,
    Snapshots, TreeError,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ConnectionHandler, ConnectionStream, ListenerError, ListenerHandle, SocketListener,
};
pub use world::{QuiesceMode, QuiesceToken, Recovery, WorldError, WorldStore};

#[cfg(test)]
mod tests;
