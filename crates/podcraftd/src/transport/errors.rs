//! Control socket failures.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while binding or running the control listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host did not resolve.
    #[error("control endpoint {host}:{port} did not resolve: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no address.
    #[error("control endpoint {host}:{port} resolved to no addresses")]
    Unresolved {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// The endpoint could not be bound.
    #[error("failed to bind control endpoint {endpoint}: {source}")]
    Bind {
        /// Endpoint in URL form.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Another process is accepting on the socket path.
    #[error("control socket {path} is served by another process")]
    SocketBusy {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// Something other than a socket occupies the path.
    #[error("{path} exists and is not a socket")]
    NotASocket {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A leftover socket could not be inspected or removed.
    #[error("failed to clear leftover control socket {path}: {source}")]
    StaleSocket {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to polling mode.
    #[error("failed to configure control listener: {source}")]
    Configure {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be started.
    #[error("failed to spawn control listener thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("control listener thread panicked")]
    Panicked,
}
