use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::modes::LogFormat;
use crate::socket::SocketEndpoint;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default server executable. Vanilla images wrap the JVM in a start script.
pub const DEFAULT_SERVER_BINARY: &str = "/mc/start.sh";

/// TCP port used where Unix domain sockets are unavailable.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default live world mount.
pub fn default_world_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("/mc/world")
}

/// Default snapshot mount.
pub fn default_snapshot_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("/mc/snapshot")
}

/// Default server configuration file mount.
pub fn default_properties_path() -> Utf8PathBuf {
    Utf8PathBuf::from("/mc/server.properties")
}

pub(crate) fn default_server_binary() -> String {
    DEFAULT_SERVER_BINARY.to_owned()
}

pub(crate) const fn default_startup_timeout_secs() -> u64 {
    120
}

pub(crate) const fn default_shutdown_grace_secs() -> u64 {
    30
}

pub(crate) const fn default_snapshot_interval_secs() -> u64 {
    3600
}

pub(crate) fn default_rcon_host() -> String {
    "127.0.0.1".to_owned()
}

pub(crate) const fn default_autostart() -> bool {
    true
}

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Directory holding the control socket and the daemon's runtime files.
///
/// Unix hosts use `$XDG_RUNTIME_DIR/podcraft`, falling back to a per-user
/// directory under the system temp dir.
pub(crate) fn default_runtime_dir() -> Utf8PathBuf {
    #[cfg(unix)]
    {
        if let Some(dir) = runtime_dir().and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok()) {
            return dir.join("podcraft");
        }
        // SAFETY: geteuid has no preconditions and cannot fail.
        let uid = unsafe { geteuid() };
        temp_root().join("podcraft").join(format!("uid-{uid}"))
    }

    #[cfg(not(unix))]
    {
        temp_root().join("podcraft")
    }
}

fn temp_root() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

/// Computes the default control socket.
///
/// Unix hosts listen on `podcraftd.sock` inside the runtime directory. Other
/// hosts listen on loopback TCP.
pub fn default_control_socket() -> SocketEndpoint {
    #[cfg(unix)]
    {
        SocketEndpoint::unix(default_runtime_dir().join("podcraftd.sock"))
    }

    #[cfg(not(unix))]
    {
        SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
    }
}
