//! Health probing of the running server.
//!
//! The server counts as healthy once it answers a Server List Ping: a
//! handshake with `next_state = 1` followed by an empty status request.
//! Every packet is `<length:varint><id:varint><data>`; the reply carries a
//! JSON document with the version, player counts and message of the day.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::HealthCheck;

/// Protocol number sent in the handshake; `-1` asks for the server's own.
const ANY_PROTOCOL: i32 = -1;

/// Upper bound on a status reply; large enough for an embedded favicon.
const MAX_PACKET_LEN: usize = 2 * 1024 * 1024;

const STATUS_PACKET: i32 = 0x00;
const NEXT_STATE_STATUS: i32 = 1;

/// Address the server is expected to answer on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Host to connect to.
    pub host: String,
    /// Game port.
    pub port: u16,
}

/// Checks whether the server is serving.
pub trait HealthProbe: Send {
    /// Probes once; never blocks longer than the probe's own timeout.
    fn probe(&self, target: &ProbeTarget) -> HealthCheck;
}

/// What the server reported about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerReport {
    /// Version name, such as `1.20.4`.
    pub version: String,
    /// Protocol number of that version.
    pub protocol: i64,
    /// Players currently connected.
    pub players_online: u32,
    /// Player slots.
    pub players_max: u32,
    /// Message of the day with formatting removed.
    pub motd: String,
}

/// Failures of one status exchange.
#[derive(Debug, Error)]
pub enum PingError {
    /// Connecting, writing or reading failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A varint ran past five bytes.
    #[error("varint longer than five bytes")]
    VarIntTooLong,
    /// The length prefix was negative or implausibly large.
    #[error("reply length {0} out of range")]
    BadLength(i64),
    /// The reply was not a status response.
    #[error("unexpected packet id {0:#04x}")]
    UnexpectedPacket(i32),
    /// The status document did not parse.
    #[error("malformed status document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Considers the server healthy once it answers a Server List Ping.
#[derive(Debug, Clone, Copy)]
pub struct ServerListPing {
    timeout: Duration,
}

impl ServerListPing {
    /// Probe whose connect, write and read steps each wait at most `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs one status exchange against `target`.
    pub fn query(&self, target: &ProbeTarget) -> Result<ServerReport, PingError> {
        let mut stream = self.connect(target)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(&status_request(&target.host, target.port))?;
        stream.flush()?;
        read_status(&mut stream)
    }

    fn connect(&self, target: &ProbeTarget) -> Result<TcpStream, PingError> {
        let mut last_error = None;
        for addr in (target.host.as_str(), target.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(error) => last_error = Some(error),
            }
        }
        Err(PingError::Io(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
        })))
    }
}

impl HealthProbe for ServerListPing {
    fn probe(&self, target: &ProbeTarget) -> HealthCheck {
        match self.query(target) {
            Ok(report) => HealthCheck::answered(report),
            Err(error) => HealthCheck::unhealthy(format!("{}:{}: {error}", target.host, target.port)),
        }
    }
}

/// Handshake followed by the status request, ready to write.
fn status_request(host: &str, port: u16) -> Vec<u8> {
    let mut handshake = Vec::with_capacity(host.len() + 16);
    write_varint(&mut handshake, STATUS_PACKET);
    write_varint(&mut handshake, ANY_PROTOCOL);
    write_string(&mut handshake, host);
    handshake.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut handshake, NEXT_STATE_STATUS);

    let mut request = Vec::new();
    write_varint(&mut request, STATUS_PACKET);

    let mut out = Vec::with_capacity(handshake.len() + request.len() + 10);
    write_frame(&mut out, &handshake);
    write_frame(&mut out, &request);
    out
}

fn read_status(reader: &mut impl Read) -> Result<ServerReport, PingError> {
    let length = read_varint(reader)?;
    let length = usize::try_from(length)
        .ok()
        .filter(|length| (1..=MAX_PACKET_LEN).contains(length))
        .ok_or(PingError::BadLength(i64::from(length)))?;
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;

    let mut body = body.as_slice();
    let id = read_varint(&mut body)?;
    if id != STATUS_PACKET {
        return Err(PingError::UnexpectedPacket(id));
    }
    let json_len = read_varint(&mut body)?;
    let json_len = usize::try_from(json_len)
        .ok()
        .filter(|json_len| *json_len <= body.len())
        .ok_or(PingError::BadLength(i64::from(json_len)))?;
    let document: StatusDocument = serde_json::from_slice(&body[..json_len])?;
    Ok(document.into_report())
}

fn write_frame(out: &mut Vec<u8>, body: &[u8]) {
    let length = i32::try_from(body.len()).unwrap_or(i32::MAX);
    write_varint(out, length);
    out.extend_from_slice(body);
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    let length = i32::try_from(value.len()).unwrap_or(i32::MAX);
    write_varint(out, length);
    out.extend_from_slice(value.as_bytes());
}

fn write_varint(out: &mut Vec<u8>, value: i32) {
    let mut rest = u32::from_ne_bytes(value.to_ne_bytes());
    loop {
        let low = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(low);
            return;
        }
        out.push(low | 0x80);
    }
}

fn read_varint(reader: &mut impl Read) -> Result<i32, PingError> {
    let mut value = 0_u32;
    for shift in (0..35).step_by(7) {
        let mut byte = [0_u8; 1];
        reader.read_exact(&mut byte)?;
        value |= u32::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(i32::from_ne_bytes(value.to_ne_bytes()));
        }
    }
    Err(PingError::VarIntTooLong)
}

#[derive(Deserialize)]
struct StatusDocument {
    version: StatusVersion,
    #[serde(default)]
    players: StatusPlayers,
    #[serde(default)]
    description: Value,
}

#[derive(Deserialize)]
struct StatusVersion {
    name: String,
    protocol: i64,
}

#[derive(Default, Deserialize)]
struct StatusPlayers {
    #[serde(default)]
    max: u32,
    #[serde(default)]
    online: u32,
}

impl StatusDocument {
    fn into_report(self) -> ServerReport {
        let mut motd = String::new();
        flatten_text(&self.description, &mut motd);
        ServerReport {
            version: self.version.name,
            protocol: self.version.protocol,
            players_online: self.players.online,
            players_max: self.players.max,
            motd,
        }
    }
}

/// Appends the plain text of a chat component: a string, an object with
/// `text` and `extra`, or an array of components.
fn flatten_text(component: &Value, out: &mut String) {
    match component {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| flatten_text(part, out)),
        Value::Object(fields) => {
            if let Some(text) = fields.get("text") {
                flatten_text(text, out);
            }
            if let Some(extra) = fields.get("extra") {
                flatten_text(extra, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
