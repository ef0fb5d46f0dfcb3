//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bootstrap::{
    ConfigLoader, ServerProvider, StaticConfigLoader, SystemConfigLoader, SystemServerProvider,
    bootstrap_with,
};
use crate::control::ControlConnectionHandler;
use crate::coordinator::{IDLE_POLL, IntentResult, LifecycleCoordinator, LifecycleIntent};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::scheduler::SnapshotScheduler;
use crate::transport::SocketListener;
use podcraft_config::RuntimePaths;

use super::RUNTIME_TARGET;
use super::errors::LaunchError;
use super::guard::{HealthState, RuntimeGuard};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Process-level collaborators needed to control daemon lifecycle.
pub(crate) struct ProcessControl<S> {
    pub(crate) shutdown: S,
}

/// Service dependencies required to construct the daemon runtime.
pub(crate) struct ServiceDeps<L, P> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) provider: P,
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S, P> {
    pub(crate) process: ProcessControl<S>,
    pub(crate) services: ServiceDeps<L, P>,
}

/// Runs the daemon using the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        process: ProcessControl {
            shutdown: SystemShutdownSignal::install()?,
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
            provider: SystemServerProvider,
        },
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
///
/// Returns once the shutdown signal fires and every worker has stopped; the
/// server is stopped gracefully on the way out.
pub(crate) fn run_daemon_with<L, S, P>(plan: LaunchPlan<L, S, P>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    P: ServerProvider,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl { shutdown } = process;
    let ServiceDeps {
        loader,
        reporter,
        provider,
    } = services;

    info!(target: RUNTIME_TARGET, "starting daemon runtime");
    let config = loader.load()?;
    config.control_socket().prepare_filesystem()?;
    let runtime_paths = RuntimePaths::from_config(&config)?;
    let mut guard = RuntimeGuard::acquire(runtime_paths)?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;
    let listener = SocketListener::bind(config.control_socket())?;

    let static_loader = StaticConfigLoader::new(config.clone());
    let daemon = bootstrap_with(&static_loader, reporter, &provider)?;
    let coordinator = LifecycleCoordinator::spawn(daemon.into_lifecycle(), IDLE_POLL).map_err(
        |source| LaunchError::Thread {
            role: "coordinator",
            source,
        },
    )?;
    let scheduler = config
        .snapshot_interval()
        .map(|interval| SnapshotScheduler::spawn(coordinator.handle(), interval))
        .transpose()
        .map_err(|source| LaunchError::Thread {
            role: "scheduler",
            source,
        })?;

    let handler = Arc::new(ControlConnectionHandler::new(coordinator.handle()));
    let listener_handle = listener.start(handler)?;

    if config.autostart {
        let (queued, _ticket) = coordinator.handle().submit(LifecycleIntent::Start);
        if !matches!(queued, IntentResult::Accepted) {
            warn!(target: RUNTIME_TARGET, "coordinator refused the autostart intent");
        }
    }

    guard.write_health(HealthState::Ready)?;
    shutdown.wait()?;
    guard.write_health(HealthState::Stopping)?;
    listener_handle.shutdown();
    let joined = listener_handle.join();
    if let Some(scheduler) = scheduler {
        scheduler.shutdown();
    }
    coordinator.shutdown();
    joined?;
    info!(target: RUNTIME_TARGET, "shutdown sequence completed");
    Ok(())
}
