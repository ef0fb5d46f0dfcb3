//! The process state machine.

use std::thread;
use std::time::{Duration, Instant};

use podcraft_config::Config;
use tracing::{info, warn};

use super::errors::ProcessError;
use super::launcher::{ChildExit, LaunchSpec, ServerChild, ServerLauncher};
use super::probe::{HealthProbe, ProbeTarget};
use super::{PROCESS_TARGET, ProcessPhase, ProcessStatus};
use crate::clock::now_rfc3339;
use crate::config_gate::ServerConfig;

/// Bound on waiting for a SIGKILLed child to be reaped.
pub(crate) const KILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between health probes and exit polls.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Time bounds for starting and stopping the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTiming {
    /// Bound on reaching the first healthy probe.
    pub startup_timeout: Duration,
    /// Time allowed after SIGTERM before SIGKILL.
    pub shutdown_grace: Duration,
    /// Time allowed after SIGKILL before giving up.
    pub kill_timeout: Duration,
    /// Sleep between probes and exit polls.
    pub poll_interval: Duration,
}

impl ProcessTiming {
    /// Timing taken from the daemon configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            startup_timeout: config.startup_timeout(),
            shutdown_grace: config.shutdown_grace(),
            kill_timeout: KILL_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Owns the supervised server process.
///
/// All transitions happen inside `&mut self` calls, so the phase observed
/// between calls is always `stopped`, `running` or `crashed`.
pub struct ProcessHandle {
    spec: LaunchSpec,
    launcher: Box<dyn ServerLauncher>,
    probe: Box<dyn HealthProbe>,
    timing: ProcessTiming,
    child: Option<Box<dyn ServerChild>>,
    target: Option<ProbeTarget>,
    status: ProcessStatus,
}

impl ProcessHandle {
    /// Builds a handle in the `stopped` phase.
    #[must_use]
    pub fn new(
        spec: LaunchSpec,
        launcher: Box<dyn ServerLauncher>,
        probe: Box<dyn HealthProbe>,
        timing: ProcessTiming,
    ) -> Self {
        Self {
            spec,
            launcher,
            probe,
            timing,
            child: None,
            target: None,
            status: ProcessStatus::stopped(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ProcessPhase {
        self.status.phase
    }

    /// True only while no server process exists.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.status.phase == ProcessPhase::Stopped
    }

    /// Copy of the current status.
    #[must_use]
    pub fn status(&self) -> ProcessStatus {
        self.status.clone()
    }

    /// Status with a fresh health probe when the server is running.
    ///
    /// A failed probe is recorded in `last_health` but does not change the
    /// phase; only an exit observed by [`Self::refresh`] marks a crash.
    pub fn query(&mut self) -> ProcessStatus {
        if self.status.phase == ProcessPhase::Running
            && let Some(target) = &self.target
        {
            self.status.last_health = Some(self.probe.probe(target));
        }
        self.status.clone()
    }

    /// Spawns the server against `config` and waits for it to become healthy.
    ///
    /// A `crashed` server is reaped first. On a health timeout the child is
    /// killed and the phase becomes `crashed`.
    pub fn start(&mut self, config: &ServerConfig) -> Result<ProcessStatus, ProcessError> {
        match self.status.phase {
            ProcessPhase::Stopped => {}
            ProcessPhase::Crashed => self.reap_crashed(),
            phase => return Err(ProcessError::AlreadyRunning { phase }),
        }

        let target = ProbeTarget {
            host: config.server_host().to_owned(),
            port: config.server_port(),
        };
        self.status = ProcessStatus {
            phase: ProcessPhase::Starting,
            ..ProcessStatus::stopped()
        };
        let mut child = match self.launcher.launch(&self.spec) {
            Ok(child) => child,
            Err(source) => {
                self.status = ProcessStatus::stopped();
                return Err(ProcessError::SpawnFailure {
                    program: self.spec.program.clone(),
                    source,
                });
            }
        };
        let pid = child.pid();
        self.status.pid = Some(pid);
        self.status.started_at = now_rfc3339().ok();
        self.status.active_revision = Some(config.revision());
        self.status.listen_port = Some(target.port);
        info!(
            target: PROCESS_TARGET,
            pid,
            program = %self.spec.program,
            revision = config.revision(),
            "server spawned; waiting for health"
        );

        let deadline = Instant::now() + self.timing.startup_timeout;
        loop {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    self.mark_crashed();
                    return Err(ProcessError::HealthTimeout {
                        timeout: self.timing.startup_timeout,
                        reason: format!("server exited during startup with {exit}"),
                    });
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(target: PROCESS_TARGET, pid, error = %error, "failed to poll server");
                }
            }

            let check = self.probe.probe(&target);
            let healthy = check.healthy;
            let detail = check.detail.clone();
            self.status.last_health = Some(check);
            if healthy {
                self.status.phase = ProcessPhase::Running;
                self.child = Some(child);
                self.target = Some(target.clone());
                info!(target: PROCESS_TARGET, pid, port = target.port, "server healthy");
                return Ok(self.status.clone());
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(target: PROCESS_TARGET, pid, "server missed its startup deadline; killing");
                if let Err(error) = child.kill() {
                    warn!(target: PROCESS_TARGET, pid, error = %error, "failed to kill server");
                }
                let reaped = wait_for_exit(child.as_mut(), self.timing.kill_timeout, self.timing.poll_interval);
                self.mark_crashed();
                if reaped.is_none() {
                    self.child = Some(child);
                }
                return Err(ProcessError::HealthTimeout {
                    timeout: self.timing.startup_timeout,
                    reason: detail.unwrap_or_else(|| "no healthy probe".to_owned()),
                });
            }
            thread::sleep(self.timing.poll_interval.min(deadline - now));
        }
    }

    /// Stops the server.
    ///
    /// A graceful stop sends SIGTERM and waits for the grace period before
    /// escalating to SIGKILL. Stopping a stopped server does nothing;
    /// stopping a crashed one reaps it.
    pub fn stop(&mut self, graceful: bool) -> Result<ProcessStatus, ProcessError> {
        match self.status.phase {
            ProcessPhase::Stopped => return Ok(self.status.clone()),
            ProcessPhase::Crashed => {
                self.reap_crashed();
                self.status = ProcessStatus::stopped();
                return Ok(self.status.clone());
            }
            ProcessPhase::Starting | ProcessPhase::Running | ProcessPhase::Stopping => {}
        }
        let Some(mut child) = self.child.take() else {
            self.status = ProcessStatus::stopped();
            return Ok(self.status.clone());
        };

        self.status.phase = ProcessPhase::Stopping;
        let pid = child.pid();
        let poll = self.timing.poll_interval;

        if graceful {
            info!(target: PROCESS_TARGET, pid, "sending SIGTERM");
            if let Err(error) = child.terminate() {
                warn!(target: PROCESS_TARGET, pid, error = %error, "failed to signal server");
            }
            if let Some(exit) = wait_for_exit(child.as_mut(), self.timing.shutdown_grace, poll) {
                return Ok(self.finish_stop(pid, exit));
            }
            warn!(target: PROCESS_TARGET, pid, "grace period expired; escalating to SIGKILL");
        }

        if let Err(error) = child.kill() {
            warn!(target: PROCESS_TARGET, pid, error = %error, "failed to kill server");
        }
        match wait_for_exit(child.as_mut(), self.timing.kill_timeout, poll) {
            Some(exit) => Ok(self.finish_stop(pid, exit)),
            None => {
                self.child = Some(child);
                self.status.phase = ProcessPhase::Crashed;
                Err(ProcessError::Timeout {
                    pid,
                    waited: self.timing.kill_timeout,
                })
            }
        }
    }

    /// Polls the child and records an unexpected exit as a crash.
    ///
    /// Returns the exit when one was detected by this call.
    pub fn refresh(&mut self) -> Option<ChildExit> {
        if self.status.phase != ProcessPhase::Running {
            return None;
        }
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(exit)) => {
                warn!(target: PROCESS_TARGET, pid = child.pid(), %exit, "server exited unexpectedly");
                self.child = None;
                self.mark_crashed();
                Some(exit)
            }
            Ok(None) => None,
            Err(error) => {
                warn!(target: PROCESS_TARGET, error = %error, "failed to poll server");
                None
            }
        }
    }

    fn finish_stop(&mut self, pid: u32, exit: ChildExit) -> ProcessStatus {
        info!(target: PROCESS_TARGET, pid, %exit, "server stopped");
        self.status = ProcessStatus::stopped();
        self.status.clone()
    }

    fn mark_crashed(&mut self) {
        self.status.phase = ProcessPhase::Crashed;
        self.status.pid = None;
        self.status.active_revision = None;
        self.status.listen_port = None;
    }

    fn reap_crashed(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let pid = child.pid();
        if let Err(error) = child.kill() {
            warn!(target: PROCESS_TARGET, pid, error = %error, "failed to kill crashed server");
        }
        if wait_for_exit(child.as_mut(), self.timing.kill_timeout, self.timing.poll_interval).is_none() {
            warn!(target: PROCESS_TARGET, pid, "crashed server could not be reaped");
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            warn!(target: PROCESS_TARGET, pid = child.pid(), "handle dropped with a live server; killing");
            if let Err(error) = child.kill() {
                warn!(target: PROCESS_TARGET, error = %error, "failed to kill server");
            }
            let _reaped = wait_for_exit(child.as_mut(), self.timing.kill_timeout, self.timing.poll_interval);
        }
    }
}

/// Polls `child` until it exits or `within` elapses.
///
/// A polling error is treated as an exit: it means the child is no longer
/// ours to wait for.
fn wait_for_exit(child: &mut dyn ServerChild, within: Duration, poll: Duration) -> Option<ChildExit> {
    let deadline = Instant::now() + within;
    loop {
        match child.try_wait() {
            Ok(Some(exit)) => return Some(exit),
            Ok(None) => {}
            Err(error) => {
                warn!(target: PROCESS_TARGET, pid = child.pid(), error = %error, "lost track of server");
                return Some(ChildExit {
                    code: None,
                    signal: None,
                });
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(poll.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::tests::support::{Delivered, FakeServer, fast_timing};

    fn config(port: &str) -> ServerConfig {
        let mut values = BTreeMap::new();
        values.insert("server-port".to_owned(), port.to_owned());
        ServerConfig::new(3, values)
    }

    #[fixture]
    fn server() -> FakeServer {
        FakeServer::new()
    }

    fn handle(server: &FakeServer) -> ProcessHandle {
        let spec = LaunchSpec {
            program: "server".to_owned(),
            args: Vec::new(),
            workdir: Utf8PathBuf::from("."),
        };
        ProcessHandle::new(spec, Box::new(server.clone()), Box::new(server.clone()), fast_timing())
    }

    #[rstest]
    fn start_reaches_running_with_revision_and_port(server: FakeServer) {
        let mut handle = handle(&server);
        let status = handle.start(&config("25570")).expect("start");
        assert_eq!(status.phase, ProcessPhase::Running);
        assert_eq!(status.active_revision, Some(3));
        assert_eq!(status.listen_port, Some(25570));
        assert!(status.pid.is_some());
        assert!(status.started_at.is_some());
        assert_eq!(server.probed_ports().first(), Some(&25570));
        assert!(!handle.is_quiescent());
    }

    #[rstest]
    fn second_start_is_refused(server: FakeServer) {
        let mut handle = handle(&server);
        handle.start(&config("25565")).expect("first start");
        let error = handle.start(&config("25565")).expect_err("already running");
        assert!(matches!(error, ProcessError::AlreadyRunning { phase: ProcessPhase::Running }));
        assert_eq!(server.launches(), 1);
    }

    #[rstest]
    fn spawn_failure_leaves_stopped(server: FakeServer) {
        server.fail_spawn();
        let mut handle = handle(&server);
        let error = handle.start(&config("25565")).expect_err("spawn fails");
        assert!(matches!(error, ProcessError::SpawnFailure { .. }));
        assert_eq!(handle.phase(), ProcessPhase::Stopped);
    }

    #[rstest]
    fn unhealthy_server_is_killed_and_crashed(server: FakeServer) {
        server.set_healthy(false);
        let mut handle = handle(&server);
        let error = handle.start(&config("25565")).expect_err("never healthy");
        assert!(matches!(error, ProcessError::HealthTimeout { .. }));
        assert_eq!(handle.phase(), ProcessPhase::Crashed);
        assert_eq!(server.signals(), vec![Delivered::Kill]);
        assert!(!server.is_alive());
    }

    #[rstest]
    fn early_exit_reports_status_in_reason(server: FakeServer) {
        server.exit_on_spawn(2);
        let mut handle = handle(&server);
        let error = handle.start(&config("25565")).expect_err("exited");
        let ProcessError::HealthTimeout { reason, .. } = error else {
            panic!("expected health timeout, got {error:?}");
        };
        assert!(reason.contains("exit code 2"), "reason: {reason}");
        assert_eq!(handle.phase(), ProcessPhase::Crashed);
    }

    #[rstest]
    fn graceful_stop_sends_sigterm_only(server: FakeServer) {
        let mut handle = handle(&server);
        handle.start(&config("25565")).expect("start");
        let status = handle.stop(true).expect("stop");
        assert_eq!(status.phase, ProcessPhase::Stopped);
        assert_eq!(server.signals(), vec![Delivered::Term]);
        assert!(handle.is_quiescent());
    }

    #[rstest]
    fn ignored_sigterm_escalates_to_sigkill(server: FakeServer) {
        server.ignore_term();
        let mut handle = handle(&server);
        handle.start(&config("25565")).expect("start");
        handle.stop(true).expect("stop");
        assert_eq!(server.signals(), vec![Delivered::Term, Delivered::Kill]);
        assert_eq!(handle.phase(), ProcessPhase::Stopped);
    }

    #[rstest]
    fn forced_stop_skips_sigterm(server: FakeServer) {
        let mut handle = handle(&server);
        handle.start(&config("25565")).expect("start");
        handle.stop(false).expect("stop");
        assert_eq!(server.signals(), vec![Delivered::Kill]);
    }

    #[rstest]
    fn unkillable_server_times_out(server: FakeServer) {
        server.ignore_term();
        server.ignore_kill();
        let mut handle = handle(&server);
        handle.start(&config("25565")).expect("start");
        let error = handle.stop(true).expect_err("never exits");
        assert!(matches!(error, ProcessError::Timeout { .. }));
        assert_eq!(handle.phase(), ProcessPhase::Crashed);
    }

    #[rstest]
    fn stop_when_stopped_is_a_no_op(server: FakeServer) {
        let mut handle = handle(&server);
        let status = handle.stop(true).expect("no-op stop");
        assert_eq!(status.phase, ProcessPhase::Stopped);
        assert!(server.signals().is_empty());
    }

    #[rstest]
    fn refresh_detects_crash_and_start_recovers(server: FakeServer) {
        let mut handle = handle(&server);
        handle.start(&config("25565")).expect("start");
        assert!(handle.refresh().is_none());
        server.crash();
        let exit = handle.refresh().expect("crash observed");
        assert_eq!(exit.code, Some(1));
        assert_eq!(handle.phase(), ProcessPhase::Crashed);
        assert!(handle.status().pid.is_none());

        handle.start(&config("25565")).expect("restart after crash");
        assert_eq!(handle.phase(), ProcessPhase::Running);
        assert_eq!(server.launches(), 2);
    }

    #[rstest]
    fn stop_acknowledges_crash(server: FakeServer) {
        let mut handle = handle(&server);
        handle.start(&config("25565")).expect("start");
        server.crash();
        handle.refresh();
        handle.stop(true).expect("acknowledge");
        assert_eq!(handle.phase(), ProcessPhase::Stopped);
    }

    #[rstest]
    fn query_reprobes_a_running_server_without_changing_phase(server: FakeServer) {
        let mut handle = handle(&server);
        let started = handle.start(&config("25571")).expect("start");
        let report = started.last_health.and_then(|health| health.server).expect("server report");
        assert_eq!(report.motd, "fake server on 25571");
        let probes = server.probed_ports().len();

        server.set_healthy(false);
        let status = handle.query();
        assert_eq!(status.phase, ProcessPhase::Running);
        assert_eq!(server.probed_ports().len(), probes + 1);
        assert_eq!(server.probed_ports().last(), Some(&25571));
        let health = status.last_health.expect("health recorded");
        assert!(!health.healthy);
        assert!(health.server.is_none());
    }

    #[rstest]
    fn query_on_a_stopped_server_does_not_probe(server: FakeServer) {
        let mut handle = handle(&server);
        let status = handle.query();
        assert_eq!(status.phase, ProcessPhase::Stopped);
        assert!(status.last_health.is_none());
        assert!(server.probed_ports().is_empty());
    }
}
