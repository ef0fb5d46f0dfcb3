//! RCON frame encoding and incremental decoding.
//!
//! A frame is `<length:i32><request_id:i32><kind:i32><payload>\0\0`, all
//! integers little-endian, where `length` counts every byte after itself.

use thiserror::Error;

/// Smallest legal value of the length prefix: two ids and two NUL bytes.
const MIN_BODY_LEN: usize = 10;

/// Upper bound on an accepted frame body. The server never sends payloads
/// over 4096 bytes; anything much larger means the stream is out of sync.
pub const MAX_BODY_LEN: usize = 64 * 1024;

/// Frame type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Output of a command (`SERVERDATA_RESPONSE_VALUE`).
    Response,
    /// A command, or the server's reply to a login.
    Command,
    /// Login request carrying the password.
    Login,
    /// Any other type value; used for the end-of-response probe.
    Other(i32),
}

impl PacketKind {
    /// Type sent after a command so the reply marks the end of its output.
    pub const SENTINEL: Self = Self::Other(100);

    /// Wire value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Response => 0,
            Self::Command => 2,
            Self::Login => 3,
            Self::Other(value) => value,
        }
    }

    /// Parses a wire value.
    #[must_use]
    pub const fn from_raw(value: i32) -> Self {
        match value {
            0 => Self::Response,
            2 => Self::Command,
            3 => Self::Login,
            other => Self::Other(other),
        }
    }
}

/// One RCON frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Correlates replies with requests; `-1` signals failed authentication.
    pub request_id: i32,
    /// Frame type.
    pub kind: PacketKind,
    /// Body without the trailing NUL pair.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Builds a frame.
    #[must_use]
    pub fn new(request_id: i32, kind: PacketKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            request_id,
            kind,
            payload: payload.into(),
        }
    }

    /// Serialises the frame including its length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let body_len = self.payload.len() + MIN_BODY_LEN;
        if body_len > MAX_BODY_LEN {
            return Err(PacketError::TooLarge { length: body_len });
        }
        let prefix = i32::try_from(body_len).map_err(|_| PacketError::TooLarge { length: body_len })?;
        let mut frame = Vec::with_capacity(body_len + 4);
        frame.extend_from_slice(&prefix.to_le_bytes());
        frame.extend_from_slice(&self.request_id.to_le_bytes());
        frame.extend_from_slice(&self.kind.raw().to_le_bytes());
        frame.extend_from_slice(&self.payload);
        frame.extend_from_slice(&[0, 0]);
        Ok(frame)
    }

    /// Decodes the first frame in `buffer`.
    ///
    /// Returns `Ok(None)` when more bytes are needed, otherwise the frame and
    /// the number of bytes it occupied.
    pub fn decode(buffer: &[u8]) -> Result<Option<(Self, usize)>, PacketError> {
        let Some(prefix) = read_i32(buffer, 0) else {
            return Ok(None);
        };
        let body_len = usize::try_from(prefix)
            .ok()
            .filter(|len| (MIN_BODY_LEN..=MAX_BODY_LEN).contains(len))
            .ok_or(PacketError::InvalidLength { length: prefix })?;
        let total = body_len + 4;
        let Some(frame) = buffer.get(..total) else {
            return Ok(None);
        };

        let (Some(request_id), Some(kind)) = (read_i32(frame, 4), read_i32(frame, 8)) else {
            return Ok(None);
        };
        let payload = frame.get(12..total - 2).unwrap_or_default();
        if frame.get(total - 2..) != Some(&[0, 0][..]) {
            return Err(PacketError::MissingTerminator);
        }

        Ok(Some((
            Self::new(request_id, PacketKind::from_raw(kind), payload.to_vec()),
            total,
        )))
    }

    /// Payload decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

fn read_i32(buffer: &[u8], offset: usize) -> Option<i32> {
    let bytes = buffer.get(offset..offset + 4)?;
    let array: [u8; 4] = bytes.try_into().ok()?;
    Some(i32::from_le_bytes(array))
}

/// Malformed frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// The length prefix is outside the legal range.
    #[error("invalid RCON frame length {length}")]
    InvalidLength {
        /// Length prefix as received.
        length: i32,
    },
    /// The frame does not end with two NUL bytes.
    #[error("RCON frame is missing its NUL terminator")]
    MissingTerminator,
    /// The payload is too large to send.
    #[error("RCON frame of {length} bytes exceeds the protocol limit")]
    TooLarge {
        /// Body length that was requested.
        length: usize,
    },
}
