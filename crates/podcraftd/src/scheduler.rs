//! Periodic snapshots.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coordinator::{CoordinatorHandle, IntentResult, LifecycleIntent};

const SCHEDULER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scheduler");

/// Submits a snapshot intent every `interval` until stopped.
///
/// Scheduled captures go through the coordinator queue like any other
/// intent, so they never overlap a manual one.
pub struct SnapshotScheduler {
    stop: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl SnapshotScheduler {
    /// Starts the schedule. The first capture happens one interval from now.
    pub fn spawn(coordinator: CoordinatorHandle, interval: Duration) -> io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let worker = thread::Builder::new()
            .name("podcraft-scheduler".to_owned())
            .spawn(move || {
                info!(target: SCHEDULER_TARGET, interval_secs = interval.as_secs(), "snapshot schedule active");
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                    match coordinator.execute(LifecycleIntent::Snapshot) {
                        IntentResult::Completed(_) => {
                            info!(target: SCHEDULER_TARGET, "scheduled snapshot completed");
                        }
                        IntentResult::Rejected(error) | IntentResult::Failed(error) => {
                            warn!(target: SCHEDULER_TARGET, kind = %error.kind(), error = %error, "scheduled snapshot failed");
                        }
                        IntentResult::Accepted => {}
                    }
                }
            })?;
        Ok(Self {
            stop,
            worker: Some(worker),
        })
    }

    /// Stops the schedule, waiting for an in-flight capture to finish.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if self.stop.send(()).is_err() {
            debug!(target: SCHEDULER_TARGET, "scheduler already stopped");
        }
        if worker.join().is_err() {
            warn!(target: SCHEDULER_TARGET, "scheduler thread panicked");
        }
    }
}

impl Drop for SnapshotScheduler {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
