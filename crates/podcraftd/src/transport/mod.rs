//! Socket listener for the control endpoint.
//!
//! The listener binds the configured endpoint and hands each accepted
//! connection to a [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::handler::read_request_line;
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
