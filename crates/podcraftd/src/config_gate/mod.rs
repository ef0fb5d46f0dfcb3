//! Mediated access to the server's `server.properties`.

mod errors;
mod gate;
mod properties;
mod schema;

pub use errors::ConfigGateError;
pub use gate::{ConfigGate, RconAccess, ServerConfig, WriteEffect, WriteOutcome};

/// Port the game server listens on when `server-port` is absent.
pub const DEFAULT_SERVER_PORT: u16 = 25565;

/// RCON port used when `rcon.port` is absent.
pub const DEFAULT_RCON_PORT: u16 = 25575;
