//! Sequencing of intents across the lifecycle components.

use std::sync::Arc;

use podcraft_config::SnapshotPolicy;
use tracing::{info, warn};

use super::{COORDINATOR_TARGET, IntentDetail, IntentResult, LifecycleError, LifecycleIntent};
use crate::cancel::CancelToken;
use crate::config_gate::ConfigGate;
use crate::health::HealthReporter;
use crate::process::{ProcessHandle, ProcessPhase, ProcessStatus};
use crate::rcon_bridge::WorldFlusher;
use crate::snapshot::{SnapshotEngine, SnapshotId, SnapshotMeta};
use crate::world::{QuiesceMode, WorldStore};

/// Components handed to [`Lifecycle::new`].
pub struct LifecycleParts {
    /// Supervised server.
    pub process: ProcessHandle,
    /// Live world directory.
    pub world: WorldStore,
    /// Snapshot store.
    pub snapshots: SnapshotEngine,
    /// `server.properties` gate.
    pub config: ConfigGate,
    /// Save suspension for hot captures.
    pub flusher: Box<dyn WorldFlusher>,
    /// Capture policy for a running server.
    pub policy: SnapshotPolicy,
    /// Complete snapshots kept after each capture; `0` keeps all.
    pub retain: usize,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn HealthReporter>,
}

/// The single writer of record for every lifecycle transition.
///
/// It is driven by exactly one thread; see
/// [`super::LifecycleCoordinator`].
pub struct Lifecycle {
    process: ProcessHandle,
    world: WorldStore,
    snapshots: SnapshotEngine,
    config: ConfigGate,
    flusher: Box<dyn WorldFlusher>,
    policy: SnapshotPolicy,
    retain: usize,
    reporter: Arc<dyn HealthReporter>,
}

impl Lifecycle {
    /// Assembles the coordinator state.
    #[must_use]
    pub fn new(parts: LifecycleParts) -> Self {
        let LifecycleParts {
            process,
            world,
            snapshots,
            config,
            flusher,
            policy,
            retain,
            reporter,
        } = parts;
        Self {
            process,
            world,
            snapshots,
            config,
            flusher,
            policy,
            retain,
            reporter,
        }
    }

    /// Runs one intent to completion.
    pub fn execute(&mut self, intent: LifecycleIntent, cancel: &CancelToken) -> IntentResult {
        self.tick();
        let name = intent.name();
        info!(target: COORDINATOR_TARGET, intent = name, "executing intent");
        let result = IntentResult::from_outcome(self.dispatch(intent, cancel));
        match &result {
            IntentResult::Failed(error) => self.reporter.intent_failed(name, error),
            IntentResult::Rejected(error) => {
                info!(target: COORDINATOR_TARGET, intent = name, kind = %error.kind(), error = %error, "intent rejected");
            }
            IntentResult::Accepted | IntentResult::Completed(_) => {}
        }
        result
    }

    /// Notices a server that exited on its own.
    pub fn tick(&mut self) {
        if let Some(exit) = self.process.refresh() {
            self.reporter.server_crashed(&exit);
        }
    }

    /// Stops the server on daemon shutdown.
    pub fn shutdown(&mut self) {
        if self.process.phase() == ProcessPhase::Stopped {
            return;
        }
        info!(target: COORDINATOR_TARGET, "stopping server for daemon shutdown");
        match self.process.stop(true) {
            Ok(_) => self.reporter.server_stopped(),
            Err(error) => self
                .reporter
                .intent_failed("shutdown", &LifecycleError::Process(error)),
        }
    }

    fn dispatch(&mut self, intent: LifecycleIntent, cancel: &CancelToken) -> Result<IntentDetail, LifecycleError> {
        match intent {
            LifecycleIntent::Start => self.start().map(IntentDetail::Process),
            LifecycleIntent::Stop { graceful } => self.stop(graceful).map(IntentDetail::Process),
            LifecycleIntent::Restart => {
                self.stop(true)?;
                self.start().map(IntentDetail::Process)
            }
            LifecycleIntent::Snapshot => self.snapshot(cancel).map(IntentDetail::Snapshot),
            LifecycleIntent::Restore { id } => self.restore(id, cancel).map(IntentDetail::Restored),
            LifecycleIntent::SetConfig { key, value } => {
                let running = self.process.phase() == ProcessPhase::Running;
                let outcome = self.config.write(&key, &value, running)?;
                Ok(IntentDetail::ConfigWrite(outcome))
            }
            LifecycleIntent::Status => Ok(IntentDetail::Process(self.process.query())),
            LifecycleIntent::ListSnapshots => Ok(IntentDetail::Snapshots(self.snapshots.list()?.collect())),
            LifecycleIntent::ReadConfig => Ok(IntentDetail::Config(self.config.read())),
        }
    }

    fn start(&mut self) -> Result<ProcessStatus, LifecycleError> {
        let status = self.process.start(&self.config.read())?;
        self.reporter.server_ready(&status);
        Ok(status)
    }

    fn stop(&mut self, graceful: bool) -> Result<ProcessStatus, LifecycleError> {
        let was_stopped = self.process.phase() == ProcessPhase::Stopped;
        let status = self.process.stop(graceful)?;
        if !was_stopped {
            self.reporter.server_stopped();
        }
        Ok(status)
    }

    fn snapshot(&mut self, cancel: &CancelToken) -> Result<SnapshotMeta, LifecycleError> {
        let hot = self.policy == SnapshotPolicy::Hot && self.process.phase() == ProcessPhase::Running;
        let meta = if hot {
            self.hot_snapshot(cancel)?
        } else {
            self.cold_snapshot(cancel)?
        };
        self.reporter.snapshot_published(&meta);
        if let Err(error) = self.snapshots.prune(self.retain) {
            warn!(target: COORDINATOR_TARGET, error = %error, "snapshot retention failed");
        }
        Ok(meta)
    }

    /// Stops a running server, captures, and starts it again.
    fn cold_snapshot(&mut self, cancel: &CancelToken) -> Result<SnapshotMeta, LifecycleError> {
        let was_running = self.process.phase() == ProcessPhase::Running;
        if !self.process.is_quiescent() {
            self.stop(true)?;
        }
        let captured = {
            let token = self.world.quiesce(QuiesceMode::Stopped);
            self.snapshots.create(&token, SnapshotPolicy::Cold, cancel)
        };
        if !was_running {
            return Ok(captured?);
        }
        match (captured, self.start()) {
            (Ok(meta), Ok(_)) => Ok(meta),
            (Ok(meta), Err(error)) => {
                warn!(
                    target: COORDINATOR_TARGET,
                    id = %meta.id,
                    "snapshot published but the server did not come back"
                );
                Err(error)
            }
            (Err(error), restarted) => {
                if let Err(restart) = restarted {
                    warn!(target: COORDINATOR_TARGET, error = %restart, "server did not come back after failed capture");
                }
                Err(error.into())
            }
        }
    }

    /// Captures a running server with saving suspended.
    fn hot_snapshot(&mut self, cancel: &CancelToken) -> Result<SnapshotMeta, LifecycleError> {
        let config = self.config.read();
        if let Err(source) = self.flusher.suspend_saves(&config) {
            if let Err(error) = self.flusher.resume_saves(&config) {
                warn!(target: COORDINATOR_TARGET, error = %error, "failed to re-enable saving");
            }
            return Err(LifecycleError::Flush { source });
        }
        let captured = {
            let token = self.world.quiesce(QuiesceMode::Paused);
            self.snapshots.create(&token, SnapshotPolicy::Hot, cancel)
        };
        if let Err(error) = self.flusher.resume_saves(&config) {
            warn!(target: COORDINATOR_TARGET, error = %error, "failed to re-enable saving");
        }
        Ok(captured?)
    }

    fn restore(&mut self, id: SnapshotId, cancel: &CancelToken) -> Result<SnapshotMeta, LifecycleError> {
        if !self.process.is_quiescent() {
            return Err(LifecycleError::ProcessRunning {
                phase: self.process.phase(),
            });
        }
        let meta = {
            let token = self.world.quiesce(QuiesceMode::Stopped);
            self.snapshots.restore(id, &token, cancel)?
        };
        self.reporter.snapshot_restored(&meta);
        Ok(meta)
    }
}
