use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::RconError;
use crate::packet::{Packet, PacketKind};

const RCON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Reply the server sends for the end-of-output probe. `0x64` is the
/// probe's type value.
const SENTINEL_REPLY: &[u8] = b"Unknown request 64";

const READ_CHUNK: usize = 4096;

/// Authenticated RCON session.
///
/// Commands are strictly sequential; each waits for its full output before
/// returning.
#[derive(Debug)]
pub struct RconClient<S = TcpStream> {
    stream: S,
    buffer: Vec<u8>,
    last_request_id: i32,
}

impl RconClient<TcpStream> {
    /// Connects to `host:port` and logs in.
    ///
    /// `timeout` bounds the connection attempt and every subsequent read and
    /// write.
    pub fn connect(
        host: &str,
        port: u16,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, RconError> {
        let address = format!("{host}:{port}");
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|source| RconError::Resolve {
                address: address.clone(),
                source,
            })?;

        let mut last_error = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout)).map_err(RconError::Io)?;
                    stream.set_write_timeout(Some(timeout)).map_err(RconError::Io)?;
                    debug!(target: RCON_TARGET, %address, "connected to RCON");
                    return Self::login(stream, password);
                }
                Err(error) => last_error = Some(error),
            }
        }

        Err(RconError::Connect {
            address,
            source: last_error.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            }),
        })
    }
}

impl<S: Read + Write> RconClient<S> {
    /// Authenticates over an already-open stream.
    pub fn login(stream: S, password: &str) -> Result<Self, RconError> {
        let mut client = Self {
            stream,
            buffer: Vec::new(),
            last_request_id: 0,
        };
        let request_id = client.next_request_id();
        client.send(&Packet::new(request_id, PacketKind::Login, password))?;

        loop {
            let packet = client.receive()?;
            if packet.request_id == -1 {
                return Err(RconError::Authentication);
            }
            if packet.request_id == request_id && packet.kind == PacketKind::Command {
                return Ok(client);
            }
            // Some servers emit an empty response frame before the auth reply.
            debug!(target: RCON_TARGET, request_id = packet.request_id, "skipping pre-auth frame");
        }
    }

    /// Runs `command` and returns its complete output.
    ///
    /// Multi-frame output is reassembled by following the command with an
    /// invalid request; the server answers it only after the last output
    /// frame.
    pub fn command(&mut self, command: &str) -> Result<String, RconError> {
        let request_id = self.next_request_id();
        self.send(&Packet::new(request_id, PacketKind::Command, command))?;
        self.send(&Packet::new(request_id, PacketKind::SENTINEL, Vec::new()))?;

        let mut output = Vec::new();
        loop {
            let packet = self.receive()?;
            if packet.request_id == -1 {
                return Err(RconError::Authentication);
            }
            if packet.request_id != request_id {
                debug!(
                    target: RCON_TARGET,
                    request_id = packet.request_id,
                    "dropping frame for another request"
                );
                continue;
            }
            if packet.payload == SENTINEL_REPLY {
                break;
            }
            output.extend_from_slice(&packet.payload);
        }

        let text = String::from_utf8_lossy(&output).into_owned();
        debug!(target: RCON_TARGET, command, bytes = text.len(), "RCON command completed");
        Ok(text)
    }

    /// Releases the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn next_request_id(&mut self) -> i32 {
        // Ids stay positive; -1 is reserved for auth failure.
        self.last_request_id = self.last_request_id.checked_add(1).unwrap_or(1);
        self.last_request_id
    }

    fn send(&mut self, packet: &Packet) -> Result<(), RconError> {
        let frame = packet.encode()?;
        self.stream.write_all(&frame).map_err(RconError::from_io)?;
        self.stream.flush().map_err(RconError::from_io)
    }

    fn receive(&mut self) -> Result<Packet, RconError> {
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            if let Some((packet, used)) = Packet::decode(&self.buffer)? {
                self.buffer.drain(..used);
                return Ok(packet);
            }
            let read = self.stream.read(&mut chunk).map_err(RconError::from_io)?;
            if read == 0 {
                return Err(RconError::Closed);
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}
