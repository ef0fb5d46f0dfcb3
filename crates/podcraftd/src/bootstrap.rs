//! Daemon bootstrap orchestration.
//!
//! Bootstrap loads configuration, installs telemetry, repairs anything an
//! interrupted run left behind and assembles the [`Lifecycle`] that the
//! coordinator thread will own.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use podcraft_config::{Config, SocketPreparationError};

use crate::config_gate::{ConfigGate, ConfigGateError};
use crate::coordinator::{Lifecycle, LifecycleParts};
use crate::health::HealthReporter;
use crate::process::{
    CommandLauncher, HealthProbe, LaunchSpec, ProcessHandle, ProcessTiming, ServerLauncher,
    ServerListPing,
};
use crate::rcon_bridge::{ConfigApplier, RconBridge, WorldFlusher};
use crate::snapshot::{SnapshotEngine, SnapshotError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::world::{Recovery, WorldError, WorldStore};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Bound on each step of one Server List Ping.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on one RCON exchange.
const RCON_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Supplies the collaborators that touch the real server.
pub trait ServerProvider: Send + Sync {
    /// Spawns server processes.
    fn launcher(&self, config: &Config) -> Box<dyn ServerLauncher>;

    /// Decides when a started server is serving.
    fn probe(&self, config: &Config) -> Box<dyn HealthProbe>;

    /// Suspends saves around hot captures.
    fn flusher(&self, config: &Config) -> Box<dyn WorldFlusher>;

    /// Pushes hot-reloadable options into the live server.
    fn applier(&self, config: &Config) -> Box<dyn ConfigApplier>;
}

/// Provider used in production: OS processes, Server List Ping and RCON.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemServerProvider;

impl ServerProvider for SystemServerProvider {
    fn launcher(&self, _config: &Config) -> Box<dyn ServerLauncher> {
        Box::new(CommandLauncher)
    }

    fn probe(&self, _config: &Config) -> Box<dyn HealthProbe> {
        Box::new(ServerListPing::new(PROBE_TIMEOUT))
    }

    fn flusher(&self, config: &Config) -> Box<dyn WorldFlusher> {
        Box::new(RconBridge::new(config.rcon_host.clone(), RCON_TIMEOUT))
    }

    fn applier(&self, config: &Config) -> Box<dyn ConfigApplier> {
        Box::new(RconBridge::new(config.rcon_host.clone(), RCON_TIMEOUT))
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The world directory could not be opened or recovered.
    #[error("failed to prepare world directory: {source}")]
    World {
        /// Underlying world store error.
        #[source]
        source: WorldError,
    },
    /// The snapshot root could not be opened or swept.
    #[error("failed to prepare snapshot store: {source}")]
    Snapshots {
        /// Underlying snapshot error.
        #[source]
        source: SnapshotError,
    },
    /// `server.properties` could not be read.
    #[error("failed to load server properties: {source}")]
    ServerConfig {
        /// Underlying gate error.
        #[source]
        source: ConfigGateError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    lifecycle: Lifecycle,
    telemetry: TelemetryHandle,
    recovery: Recovery,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// What world recovery found at startup.
    #[must_use]
    pub fn recovery(&self) -> Recovery {
        self.recovery
    }

    /// Hands the assembled lifecycle to its coordinator.
    #[must_use]
    pub fn into_lifecycle(self) -> Lifecycle {
        self.lifecycle
    }
}

/// Bootstraps the daemon using the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    provider: &dyn ServerProvider,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match assemble(loader, &reporter, provider) {
        Ok(daemon) => {
            reporter.bootstrap_succeeded(&daemon.config);
            Ok(daemon)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn assemble(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
    provider: &dyn ServerProvider,
) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .control_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let world = WorldStore::open(config.world_dir()).map_err(|source| BootstrapError::World { source })?;
    let recovery = world
        .recover()
        .map_err(|source| BootstrapError::World { source })?;

    let snapshots = SnapshotEngine::open(config.snapshot_dir())
        .map_err(|source| BootstrapError::Snapshots { source })?;
    let swept = snapshots
        .sweep_staging()
        .map_err(|source| BootstrapError::Snapshots { source })?;

    let gate = ConfigGate::open(config.properties_path(), provider.applier(&config))
        .map_err(|source| BootstrapError::ServerConfig { source })?;

    info!(
        target: BOOTSTRAP_TARGET,
        recovery = ?recovery,
        swept,
        "startup recovery finished"
    );

    let spec = LaunchSpec {
        program: config.server_binary.clone(),
        args: config.server_args.clone(),
        workdir: config.server_workdir(),
    };
    let process = ProcessHandle::new(
        spec,
        provider.launcher(&config),
        provider.probe(&config),
        ProcessTiming::from_config(&config),
    );

    let lifecycle = Lifecycle::new(LifecycleParts {
        process,
        world,
        snapshots,
        config: gate,
        flusher: provider.flusher(&config),
        policy: config.snapshot_policy,
        retain: config.snapshot_retain,
        reporter: Arc::clone(reporter),
    });

    Ok(Daemon {
        config,
        lifecycle,
        telemetry,
        recovery,
    })
}
