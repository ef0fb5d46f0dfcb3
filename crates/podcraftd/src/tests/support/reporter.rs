//! Test double for [`HealthReporter`] that records structured events.

use std::sync::Mutex;

use podcraft_config::Config;

use crate::bootstrap::BootstrapError;
use crate::coordinator::{ErrorKind, LifecycleError};
use crate::health::HealthReporter;
use crate::process::{ChildExit, ProcessStatus};
use crate::snapshot::{SnapshotId, SnapshotMeta};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ServerReady { revision: Option<u64> },
    ServerStopped,
    ServerCrashed,
    SnapshotPublished(SnapshotId),
    SnapshotRestored(SnapshotId),
    IntentFailed { intent: String, kind: ErrorKind },
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn server_ready(&self, status: &ProcessStatus) {
        self.record(HealthEvent::ServerReady {
            revision: status.active_revision,
        });
    }

    fn server_stopped(&self) {
        self.record(HealthEvent::ServerStopped);
    }

    fn server_crashed(&self, _exit: &ChildExit) {
        self.record(HealthEvent::ServerCrashed);
    }

    fn snapshot_published(&self, snapshot: &SnapshotMeta) {
        self.record(HealthEvent::SnapshotPublished(snapshot.id));
    }

    fn snapshot_restored(&self, snapshot: &SnapshotMeta) {
        self.record(HealthEvent::SnapshotRestored(snapshot.id));
    }

    fn intent_failed(&self, intent: &str, error: &LifecycleError) {
        self.record(HealthEvent::IntentFailed {
            intent: intent.to_owned(),
            kind: error.kind(),
        });
    }
}
