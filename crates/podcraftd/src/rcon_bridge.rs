//! Server-side effects delivered over RCON.
//!
//! Hot snapshots need the server to flush and stop writing region files, and
//! hot-reloadable options need a console command. Both go through the traits
//! here so the coordinator never talks to a socket directly.

use std::time::Duration;

use podcraft_rcon::{RconClient, RconError};
use thiserror::Error;
use tracing::info;

use crate::config_gate::ServerConfig;

const RCON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::rcon");

/// Errors raised while driving the server over RCON.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `enable-rcon` is off or no password is configured.
    #[error("RCON is not enabled in server.properties")]
    Disabled,
    /// The option has no console command.
    #[error("option '{key}' cannot be applied live")]
    NotLive {
        /// Option key.
        key: String,
    },
    /// The RCON exchange failed.
    #[error(transparent)]
    Rcon(#[from] RconError),
}

/// Suspends and resumes world saving around a live capture.
#[cfg_attr(test, mockall::automock)]
pub trait WorldFlusher: Send {
    /// Flushes pending chunks and stops further saves.
    fn suspend_saves(&self, config: &ServerConfig) -> Result<(), BridgeError>;

    /// Re-enables saving.
    fn resume_saves(&self, config: &ServerConfig) -> Result<(), BridgeError>;
}

/// Applies a hot-reloadable option to the running server.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigApplier: Send {
    /// Pushes `key = value` into the live server.
    fn apply(&self, config: &ServerConfig, key: &str, value: &str) -> Result<(), BridgeError>;
}

/// Production bridge opening one RCON session per operation.
#[derive(Debug, Clone)]
pub struct RconBridge {
    host: String,
    timeout: Duration,
}

impl RconBridge {
    /// Bridge to the server's RCON port on `host`.
    #[must_use]
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }

    fn run(&self, config: &ServerConfig, commands: &[&str]) -> Result<(), BridgeError> {
        let access = config.rcon().ok_or(BridgeError::Disabled)?;
        let mut client = RconClient::connect(&self.host, access.port, &access.password, self.timeout)?;
        for command in commands {
            let output = client.command(command)?;
            info!(target: RCON_TARGET, command, output = %output.trim(), "server command sent");
        }
        Ok(())
    }
}

impl WorldFlusher for RconBridge {
    fn suspend_saves(&self, config: &ServerConfig) -> Result<(), BridgeError> {
        self.run(config, &["save-off", "save-all flush"])
    }

    fn resume_saves(&self, config: &ServerConfig) -> Result<(), BridgeError> {
        self.run(config, &["save-on"])
    }
}

impl ConfigApplier for RconBridge {
    fn apply(&self, config: &ServerConfig, key: &str, value: &str) -> Result<(), BridgeError> {
        let command = live_command(key, value).ok_or_else(|| BridgeError::NotLive {
            key: key.to_owned(),
        })?;
        self.run(config, &[command.as_str()])
    }
}

/// Console command that applies an option without a restart.
fn live_command(key: &str, value: &str) -> Option<String> {
    match key {
        "difficulty" => Some(format!("difficulty {value}")),
        "white-list" => Some(if value == "true" {
            "whitelist on".to_owned()
        } else {
            "whitelist off".to_owned()
        }),
        _ => None,
    }
}
