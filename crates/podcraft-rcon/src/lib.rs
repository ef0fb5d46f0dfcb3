//! Minimal blocking client for the Source RCON protocol spoken by Minecraft
//! servers.
//!
//! The daemon uses it to flush and suspend world saves around hot snapshots
//! and to apply hot-reloadable settings without restarting the server.

mod client;
mod error;
mod packet;

pub use client::RconClient;
pub use error::RconError;
pub use packet::{MAX_BODY_LEN, Packet, PacketError, PacketKind};
