//! Connection streams and bounded request reading.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// Upper bound on a single request line.
pub(crate) const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Stream types accepted by the control listener.
#[derive(Debug)]
pub enum ConnectionStream {
    /// Client on the TCP endpoint.
    Tcp(TcpStream),
    /// Client on the Unix endpoint.
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Bounds how long a read may wait for the client.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_read_timeout(timeout),
            Self::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Reads one newline-terminated request of at most [`MAX_REQUEST_BYTES`].
///
/// Returns `Ok(None)` when the client disconnects without sending anything;
/// a final unterminated line is returned as-is.
pub(crate) fn read_request_line<R: Read>(stream: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let bytes_read = read_chunk_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            return Ok(if buffer.is_empty() { None } else { Some(buffer) });
        }
        if let Some(pos) = chunk[..bytes_read].iter().position(|byte| *byte == b'\n') {
            buffer.extend_from_slice(&chunk[..=pos]);
            enforce_request_limit(buffer.len())?;
            return Ok(Some(buffer));
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);
        enforce_request_limit(buffer.len())?;
    }
}

fn read_chunk_with_retry<R: Read>(stream: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn enforce_request_limit(size: usize) -> io::Result<()> {
    if size > MAX_REQUEST_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "request exceeds maximum size",
        ));
    }
    Ok(())
}
