//! Spawning and signalling the server process.

use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus, Stdio};

use camino::Utf8PathBuf;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// Everything needed to spawn the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable path or name.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub workdir: Utf8PathBuf,
}

/// How a child exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, when the child exited normally.
    pub code: Option<i32>,
    /// Terminating signal, when it was killed.
    pub signal: Option<i32>,
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// A spawned server process.
pub trait ServerChild: Send {
    /// OS process id.
    fn pid(&self) -> u32;

    /// Reaps the child if it has exited.
    fn try_wait(&mut self) -> io::Result<Option<ChildExit>>;

    /// Asks the child to exit (SIGTERM).
    fn terminate(&mut self) -> io::Result<()>;

    /// Forces the child to exit (SIGKILL).
    fn kill(&mut self) -> io::Result<()>;
}

/// Creates server processes.
pub trait ServerLauncher: Send {
    /// Spawns the server described by `spec`.
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ServerChild>>;
}

/// Launcher backed by [`std::process::Command`].
///
/// The child inherits stdout and stderr so the server's own log reaches the
/// container log next to the daemon's.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

impl ServerLauncher for CommandLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ServerChild>> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(spec.workdir.as_std_path())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;
        Ok(Box::new(SystemChild { child }))
    }
}

/// [`ServerChild`] wrapping an OS process.
#[derive(Debug)]
pub(crate) struct SystemChild {
    child: Child,
}

impl ServerChild for SystemChild {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self.child.try_wait()?.map(ChildExit::from))
    }

    fn terminate(&mut self) -> io::Result<()> {
        let raw = i32::try_from(self.child.id())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            Err(error) if error.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}
