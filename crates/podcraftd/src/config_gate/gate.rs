use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use super::errors::ConfigGateError;
use super::properties::PropertiesDocument;
use super::schema;
use super::{DEFAULT_RCON_PORT, DEFAULT_SERVER_PORT};
use crate::files::atomic_write;
use crate::rcon_bridge::ConfigApplier;

const CONFIG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::config");

/// Immutable view of the server configuration at one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    revision: u64,
    values: BTreeMap<String, String>,
}

/// Credentials for the server's RCON listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconAccess {
    /// RCON TCP port.
    pub port: u16,
    /// RCON password.
    pub password: String,
}

impl ServerConfig {
    /// Builds a view directly; used by tests and the gate.
    #[must_use]
    pub fn new(revision: u64, values: BTreeMap<String, String>) -> Self {
        Self { revision, values }
    }

    /// Revision this view was taken at.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Value of `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// All key/value pairs.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Game port, defaulting to 25565.
    #[must_use]
    pub fn server_port(&self) -> u16 {
        self.get("server-port")
            .and_then(|port| port.parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Address to reach the server on. Wildcard or empty binds map to
    /// loopback.
    #[must_use]
    pub fn server_host(&self) -> &str {
        match self.get("server-ip") {
            None | Some("" | "0.0.0.0" | "::") => "127.0.0.1",
            Some(host) => host,
        }
    }

    /// RCON credentials when `enable-rcon` is on and a password is set.
    #[must_use]
    pub fn rcon(&self) -> Option<RconAccess> {
        if self.get("enable-rcon") != Some("true") {
            return None;
        }
        let password = self.get("rcon.password").filter(|pw| !pw.is_empty())?;
        let port = self
            .get("rcon.port")
            .and_then(|port| port.parse().ok())
            .unwrap_or(DEFAULT_RCON_PORT);
        Some(RconAccess {
            port,
            password: password.to_owned(),
        })
    }
}

/// How an accepted write reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteEffect {
    /// Stored while the server was not running; used at next start.
    Stored,
    /// Stored and applied to the running server.
    Applied,
    /// Stored; the running server keeps the old value until restarted.
    PendingRestart,
}

/// Result of an accepted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// Canonical key written.
    pub key: String,
    /// Normalised value written.
    pub value: String,
    /// Revision after the write.
    pub revision: u64,
    /// Whether the running server picked it up.
    pub effect: WriteEffect,
}

/// Single writer of `server.properties`.
///
/// Every accepted write is persisted before the revision moves, so a failed
/// persist leaves both the file and the revision untouched.
pub struct ConfigGate {
    path: Utf8PathBuf,
    document: PropertiesDocument,
    revision: u64,
    applier: Box<dyn ConfigApplier>,
}

impl ConfigGate {
    /// Loads `path`; a missing file starts empty. The first revision is 1.
    pub fn open(
        path: impl Into<Utf8PathBuf>,
        applier: Box<dyn ConfigApplier>,
    ) -> Result<Self, ConfigGateError> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(text) => PropertiesDocument::parse(&text),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn!(target: CONFIG_TARGET, path = %path, "server properties missing; starting empty");
                PropertiesDocument::default()
            }
            Err(source) => return Err(ConfigGateError::Read { path, source }),
        };
        Ok(Self {
            path,
            document,
            revision: 1,
            applier,
        })
    }

    /// Properties file location.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Current configuration and revision.
    #[must_use]
    pub fn read(&self) -> ServerConfig {
        ServerConfig::new(self.revision, self.document.values())
    }

    /// Validates, persists and, when possible, live-applies one option.
    ///
    /// `running` tells the gate whether a server is serving the current
    /// revision.
    pub fn write(
        &mut self,
        key: &str,
        value: &str,
        running: bool,
    ) -> Result<WriteOutcome, ConfigGateError> {
        let spec = schema::lookup(key).ok_or_else(|| ConfigGateError::UnknownOption {
            key: key.to_owned(),
        })?;
        let normalised = spec
            .normalise(value)
            .map_err(|reason| ConfigGateError::Validation {
                key: spec.key.to_owned(),
                value: value.to_owned(),
                reason,
            })?;

        let mut updated = self.document.clone();
        updated.set(spec.key, &normalised);
        atomic_write(&self.path, updated.render().as_bytes()).map_err(|source| ConfigGateError::Persist {
            path: self.path.clone(),
            source,
        })?;
        self.document = updated;
        self.revision += 1;

        let effect = if !running {
            WriteEffect::Stored
        } else if spec.hot {
            match self.applier.apply(&self.read(), spec.key, &normalised) {
                Ok(()) => WriteEffect::Applied,
                Err(error) => {
                    warn!(
                        target: CONFIG_TARGET,
                        key = spec.key,
                        error = %error,
                        "live apply failed; change waits for restart"
                    );
                    WriteEffect::PendingRestart
                }
            }
        } else {
            WriteEffect::PendingRestart
        };

        info!(
            target: CONFIG_TARGET,
            key = spec.key,
            value = %normalised,
            revision = self.revision,
            ?effect,
            "server option written"
        );
        Ok(WriteOutcome {
            key: spec.key.to_owned(),
            value: normalised,
            revision: self.revision,
            effect,
        })
    }
}
