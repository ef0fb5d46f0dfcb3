//! The single worker thread that owns the lifecycle.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::{COORDINATOR_TARGET, IntentResult, Lifecycle, LifecycleError, LifecycleIntent};
use crate::cancel::CancelToken;

/// How often an idle worker polls the server for an unexpected exit.
pub const IDLE_POLL: Duration = Duration::from_secs(1);

enum Message {
    Intent {
        intent: LifecycleIntent,
        cancel: CancelToken,
        reply: Sender<IntentResult>,
    },
    Shutdown,
}

/// Runs intents one at a time on a dedicated thread.
///
/// Dropping the coordinator stops the server gracefully and joins the
/// worker.
pub struct LifecycleCoordinator {
    handle: CoordinatorHandle,
    worker: Option<JoinHandle<()>>,
}

impl LifecycleCoordinator {
    /// Moves `lifecycle` onto a new worker thread.
    pub fn spawn(lifecycle: Lifecycle, idle_poll: Duration) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("podcraft-coordinator".to_owned())
            .spawn(move || run_worker(lifecycle, &receiver, idle_poll))?;
        Ok(Self {
            handle: CoordinatorHandle { sender },
            worker: Some(worker),
        })
    }

    /// Cloneable submission handle.
    #[must_use]
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Stops the server and joins the worker once queued intents finish.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if self.handle.sender.send(Message::Shutdown).is_err() {
            debug!(target: COORDINATOR_TARGET, "coordinator already stopped");
        }
        if worker.join().is_err() {
            warn!(target: COORDINATOR_TARGET, "coordinator thread panicked");
        }
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn run_worker(mut lifecycle: Lifecycle, receiver: &Receiver<Message>, idle_poll: Duration) {
    loop {
        match receiver.recv_timeout(idle_poll) {
            Ok(Message::Intent {
                intent,
                cancel,
                reply,
            }) => {
                let result = if intent.is_cancellable() && cancel.is_cancelled() {
                    IntentResult::Failed(LifecycleError::Cancelled)
                } else {
                    lifecycle.execute(intent, &cancel)
                };
                if reply.send(result).is_err() {
                    debug!(target: COORDINATOR_TARGET, "intent submitter went away");
                }
            }
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => lifecycle.tick(),
        }
    }
    lifecycle.shutdown();
}

/// Submits intents to the coordinator from any thread.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: Sender<Message>,
}

impl CoordinatorHandle {
    /// Queues `intent`.
    ///
    /// Returns [`IntentResult::Accepted`] and a ticket for the final result,
    /// or [`IntentResult::Failed`] with [`LifecycleError::Unavailable`] when
    /// the coordinator has shut down; that ticket then yields the same.
    pub fn submit(&self, intent: LifecycleIntent) -> (IntentResult, Ticket) {
        let (reply, result) = mpsc::channel();
        let cancel = CancelToken::new();
        let message = Message::Intent {
            intent,
            cancel: cancel.clone(),
            reply,
        };
        let accepted = match self.sender.send(message) {
            Ok(()) => IntentResult::Accepted,
            Err(_) => IntentResult::Failed(LifecycleError::Unavailable),
        };
        (accepted, Ticket { cancel, result })
    }

    /// Queues `intent` and waits for its final result.
    pub fn execute(&self, intent: LifecycleIntent) -> IntentResult {
        let (_, ticket) = self.submit(intent);
        ticket.wait()
    }
}

/// Claim on the result of a submitted intent.
pub struct Ticket {
    cancel: CancelToken,
    result: Receiver<IntentResult>,
}

impl Ticket {
    /// Asks a queued or running snapshot or restore to stop between files.
    ///
    /// Has no effect once the publish or swap has begun, or on other intents.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the intent finishes.
    pub fn wait(self) -> IntentResult {
        self.result
            .recv()
            .unwrap_or(IntentResult::Failed(LifecycleError::Unavailable))
    }
}
