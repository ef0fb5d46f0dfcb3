//! Structured health reporting for daemon and server lifecycle events.

use std::sync::Arc;

use podcraft_config::Config;

use crate::bootstrap::BootstrapError;
use crate::coordinator::LifecycleError;
use crate::process::{ChildExit, ProcessStatus};
use crate::snapshot::SnapshotMeta;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the server answers its health probe.
    fn server_ready(&self, status: &ProcessStatus);

    /// Invoked after a requested stop completes.
    fn server_stopped(&self);

    /// Invoked when the server exits without being asked to.
    fn server_crashed(&self, exit: &ChildExit);

    /// Invoked after a snapshot is published.
    fn snapshot_published(&self, snapshot: &SnapshotMeta);

    /// Invoked after the world has been replaced by a snapshot.
    fn snapshot_restored(&self, snapshot: &SnapshotMeta);

    /// Invoked when an intent was attempted and failed.
    fn intent_failed(&self, intent: &str, error: &LifecycleError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn server_ready(&self, status: &ProcessStatus) {
        (**self).server_ready(status);
    }

    fn server_stopped(&self) {
        (**self).server_stopped();
    }

    fn server_crashed(&self, exit: &ChildExit) {
        (**self).server_crashed(exit);
    }

    fn snapshot_published(&self, snapshot: &SnapshotMeta) {
        (**self).snapshot_published(snapshot);
    }

    fn snapshot_restored(&self, snapshot: &SnapshotMeta) {
        (**self).snapshot_restored(snapshot);
    }

    fn intent_failed(&self, intent: &str, error: &LifecycleError) {
        (**self).intent_failed(intent, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.control_socket(),
            world = %config.world_dir(),
            snapshots = %config.snapshot_dir(),
            policy = %config.snapshot_policy,
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn server_ready(&self, status: &ProcessStatus) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_ready",
            pid = ?status.pid,
            port = ?status.listen_port,
            revision = ?status.active_revision,
            "server ready"
        );
    }

    fn server_stopped(&self) {
        tracing::info!(target: HEALTH_TARGET, event = "server_stopped", "server stopped");
    }

    fn server_crashed(&self, exit: &ChildExit) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "server_crashed",
            exit = %exit,
            "server exited unexpectedly"
        );
    }

    fn snapshot_published(&self, snapshot: &SnapshotMeta) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "snapshot_published",
            id = %snapshot.id,
            policy = %snapshot.policy,
            files = snapshot.file_count,
            bytes = snapshot.size_bytes,
            "snapshot published"
        );
    }

    fn snapshot_restored(&self, snapshot: &SnapshotMeta) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "snapshot_restored",
            id = %snapshot.id,
            "world restored from snapshot"
        );
    }

    fn intent_failed(&self, intent: &str, error: &LifecycleError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "intent_failed",
            intent,
            kind = %error.kind(),
            error = %error,
            "lifecycle intent failed"
        );
    }
}
