//! Shared configuration for the podcraft management daemon.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an optional
//! TOML file (`--config-path` or `PODCRAFT_CONFIG_PATH`), then `PODCRAFT_*`
//! environment variables, then command-line flags. The three mount points
//! supplied by the deployment (world directory, snapshot directory and the
//! server properties file) are ordinary fields so container images can point
//! them anywhere.

mod defaults;
mod modes;
mod runtime;
mod socket;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SERVER_BINARY, DEFAULT_TCP_PORT, default_control_socket,
    default_log_filter, default_log_format, default_properties_path, default_snapshot_dir,
    default_world_dir,
};
pub use modes::{LogFormat, ModeParseError, SnapshotPolicy};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PODCRAFT")]
pub struct Config {
    /// Live world directory the game server reads and writes.
    #[serde(default = "defaults::default_world_dir")]
    pub world_dir: Utf8PathBuf,
    /// Directory holding one subdirectory per published snapshot.
    #[serde(default = "defaults::default_snapshot_dir")]
    pub snapshot_dir: Utf8PathBuf,
    /// The game server's `server.properties` file.
    #[serde(default = "defaults::default_properties_path")]
    pub properties_path: Utf8PathBuf,
    /// Executable launched as the supervised server.
    #[serde(default = "defaults::default_server_binary")]
    pub server_binary: String,
    /// Arguments passed verbatim to [`Config::server_binary`].
    #[serde(default)]
    pub server_args: Vec<String>,
    /// Working directory for the server; defaults to the world's parent.
    #[serde(default)]
    pub server_workdir: Option<Utf8PathBuf>,
    /// Seconds to wait for the first successful health probe.
    #[serde(default = "defaults::default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    /// Seconds to wait after SIGTERM before escalating to SIGKILL.
    #[serde(default = "defaults::default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Whether snapshots stop the server (`cold`) or flush it live (`hot`).
    #[serde(default)]
    pub snapshot_policy: SnapshotPolicy,
    /// Seconds between scheduled snapshots; `0` disables the schedule.
    #[serde(default = "defaults::default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    /// Number of complete snapshots kept after each capture; `0` keeps
    /// everything.
    #[serde(default)]
    pub snapshot_retain: usize,
    /// Host used to reach the server's RCON port.
    #[serde(default = "defaults::default_rcon_host")]
    pub rcon_host: String,
    /// Start the server as soon as the daemon is ready.
    #[serde(default = "defaults::default_autostart")]
    pub autostart: bool,
    /// Endpoint accepting JSONL lifecycle intents.
    #[serde(default = "defaults::default_control_socket")]
    pub control_socket: SocketEndpoint,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_dir: default_world_dir(),
            snapshot_dir: default_snapshot_dir(),
            properties_path: default_properties_path(),
            server_binary: defaults::default_server_binary(),
            server_args: Vec::new(),
            server_workdir: None,
            startup_timeout_secs: defaults::default_startup_timeout_secs(),
            shutdown_grace_secs: defaults::default_shutdown_grace_secs(),
            snapshot_policy: SnapshotPolicy::default(),
            snapshot_interval_secs: defaults::default_snapshot_interval_secs(),
            snapshot_retain: 0,
            rcon_host: defaults::default_rcon_host(),
            autostart: defaults::default_autostart(),
            control_socket: default_control_socket(),
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Live world directory.
    #[must_use]
    pub fn world_dir(&self) -> &Utf8Path {
        &self.world_dir
    }

    /// Snapshot root directory.
    #[must_use]
    pub fn snapshot_dir(&self) -> &Utf8Path {
        &self.snapshot_dir
    }

    /// Path of the server properties file.
    #[must_use]
    pub fn properties_path(&self) -> &Utf8Path {
        &self.properties_path
    }

    /// Working directory for the server process.
    ///
    /// Falls back to the parent of the world directory, which is where a
    /// vanilla server expects to find `server.properties` and its world.
    #[must_use]
    pub fn server_workdir(&self) -> Utf8PathBuf {
        if let Some(dir) = &self.server_workdir {
            return dir.clone();
        }
        self.world_dir
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf)
    }

    /// Bound on the startup health wait.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Grace period granted after SIGTERM.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Interval between scheduled snapshots, or `None` when disabled.
    #[must_use]
    pub const fn snapshot_interval(&self) -> Option<Duration> {
        if self.snapshot_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.snapshot_interval_secs))
        }
    }

    /// Control socket endpoint.
    #[must_use]
    pub fn control_socket(&self) -> &SocketEndpoint {
        &self.control_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_container_mounts() {
        let config = Config::default();
        assert_eq!(config.world_dir(), "/mc/world");
        assert_eq!(config.snapshot_dir(), "/mc/snapshot");
        assert_eq!(config.properties_path(), "/mc/server.properties");
        assert_eq!(config.snapshot_policy, SnapshotPolicy::Cold);
    }

    #[test]
    fn workdir_defaults_to_world_parent() {
        let config = Config::default();
        assert_eq!(config.server_workdir(), Utf8PathBuf::from("/mc"));
    }

    #[test]
    fn workdir_override_wins() {
        let config = Config {
            server_workdir: Some(Utf8PathBuf::from("/srv/game")),
            ..Config::default()
        };
        assert_eq!(config.server_workdir(), Utf8PathBuf::from("/srv/game"));
    }

    #[test]
    fn zero_interval_disables_schedule() {
        let config = Config {
            snapshot_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.snapshot_interval().is_none());
        assert_eq!(
            Config::default().snapshot_interval(),
            Some(Duration::from_secs(3600))
        );
    }
}
