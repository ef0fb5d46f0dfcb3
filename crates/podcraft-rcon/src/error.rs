use std::io;

use thiserror::Error;

use crate::packet::PacketError;

/// Errors raised by [`crate::RconClient`].
#[derive(Debug, Error)]
pub enum RconError {
    /// The address did not resolve to anything connectable.
    #[error("failed to resolve RCON address '{address}': {source}")]
    Resolve {
        /// Address as supplied.
        address: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Every resolved address refused or timed out.
    #[error("failed to connect to RCON at '{address}': {source}")]
    Connect {
        /// Address as supplied.
        address: String,
        /// Last connection error.
        #[source]
        source: io::Error,
    },
    /// The server rejected the password.
    #[error("RCON authentication failed")]
    Authentication,
    /// No reply within the configured timeout.
    #[error("timed out waiting for the RCON server")]
    Timeout,
    /// The server closed the connection mid-exchange.
    #[error("RCON connection closed by the server")]
    Closed,
    /// Reading or writing the socket failed.
    #[error("RCON transport error: {0}")]
    Io(#[source] io::Error),
    /// The server sent a malformed frame.
    #[error(transparent)]
    Packet(#[from] PacketError),
}

impl RconError {
    pub(crate) fn from_io(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io(error),
        }
    }
}
