//! Test suites for the podcraft daemon.

mod daemon_behaviour;
mod flusher_behaviour;
pub(crate) mod support;
