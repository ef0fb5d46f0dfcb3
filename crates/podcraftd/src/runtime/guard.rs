//! Runtime lock, pid and health files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;

use camino::Utf8Path;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use podcraft_config::RuntimePaths;
use serde::Serialize;
use tracing::{info, warn};

use super::RUNTIME_TARGET;
use super::errors::LaunchError;
use crate::clock;

/// Holds the daemon lock and publishes its pid and health files.
///
/// Dropping the guard removes all three files.
#[derive(Debug)]
pub(crate) struct RuntimeGuard {
    paths: RuntimePaths,
    _lock: File,
    pid: Option<u32>,
}

impl RuntimeGuard {
    pub(crate) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(crate) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let path = self.paths.pid_path();
        write_private(path, format!("{pid}\n").as_bytes()).map_err(file_error("write", path))?;
        self.pid = Some(pid);
        info!(target: RUNTIME_TARGET, pid, file = %path, "pid file written");
        Ok(())
    }

    pub(crate) fn write_health(&self, state: HealthState) -> Result<(), LaunchError> {
        let pid = self.pid.ok_or(LaunchError::MissingPid)?;
        let snapshot = HealthSnapshot {
            status: state,
            pid,
            timestamp: clock::now_rfc3339()?,
        };
        let mut body = serde_json::to_vec(&snapshot)?;
        body.push(b'\n');
        let path = self.paths.health_path();
        write_private(path, &body).map_err(file_error("write", path))?;
        info!(
            target: RUNTIME_TARGET,
            status = state.as_str(),
            file = %path,
            "health snapshot updated"
        );
        Ok(())
    }
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        for path in [
            self.paths.health_path(),
            self.paths.pid_path(),
            self.paths.lock_path(),
        ] {
            match fs::remove_file(path) {
                Err(error) if error.kind() != io::ErrorKind::NotFound => {
                    warn!(
                        target: RUNTIME_TARGET,
                        file = %path,
                        error = %error,
                        "failed to remove runtime file"
                    );
                }
                _ => {}
            }
        }
    }
}

/// Daemon readiness published in the health file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Bootstrap in progress.
    Starting,
    /// Accepting intents.
    Ready,
    /// Shutdown in progress.
    Stopping,
}

impl HealthState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: HealthState,
    pid: u32,
    timestamp: String,
}

fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).mode(0o600);
    options
}

fn write_private(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let mut file = private_options().create(true).truncate(true).open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    match private_options().create_new(true).open(paths.lock_path()) {
        Ok(file) => {
            info!(target: RUNTIME_TARGET, file = %paths.lock_path(), "acquired daemon lock");
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(file_error("create", paths.lock_path())(source)),
    }
}

fn handle_existing_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    if let Some(pid) = read_pid(paths.pid_path())
        && process_alive(pid)?
    {
        info!(target: RUNTIME_TARGET, pid, "refusing to start: existing daemon alive");
        return Err(LaunchError::AlreadyRunning { pid });
    }
    warn!(target: RUNTIME_TARGET, "existing daemon not detected; cleaning stale files");
    remove_stale(paths.lock_path())?;
    remove_stale(paths.pid_path())?;
    acquire_lock(paths)
}

fn file_error(action: &'static str, path: &Utf8Path) -> impl FnOnce(io::Error) -> LaunchError {
    let path = path.to_path_buf();
    move |source| LaunchError::RuntimeFile {
        action,
        path,
        source,
    }
}

fn read_pid(path: &Utf8Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn remove_stale(path: &Utf8Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(file_error("remove", path)(source)),
    }
}

fn process_alive(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    if raw == 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(LaunchError::CheckProcess { pid, source: errno }),
    }
}
