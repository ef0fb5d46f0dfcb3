//! Top-level lifecycle state machine.
//!
//! Every intent, including read-only queries, runs on one worker thread, so
//! callers on any thread observe a single linear history.

mod errors;
mod intent;
mod lifecycle;
mod worker;

pub use errors::{ErrorKind, LifecycleError};
pub use intent::{IntentDetail, IntentResult, LifecycleIntent};
pub use lifecycle::{Lifecycle, LifecycleParts};
pub use worker::{CoordinatorHandle, IDLE_POLL, LifecycleCoordinator, Ticket};

pub(crate) const COORDINATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::coordinator");
