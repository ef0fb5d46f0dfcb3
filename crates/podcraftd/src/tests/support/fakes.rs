//! In-memory stand-ins for the server process and its health probe.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::process::{
    ChildExit, HealthCheck, HealthProbe, ProbeTarget, ProcessTiming, ServerChild, ServerLauncher,
    ServerReport,
};

/// Signal delivered to a fake child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    Term,
    Kill,
}

#[derive(Debug, Default)]
struct ServerState {
    fail_spawn: bool,
    exit_on_spawn: Option<ChildExit>,
    ignore_term: bool,
    ignore_kill: bool,
    launches: u32,
    exited: Option<ChildExit>,
    signals: Vec<Delivered>,
    probes: Vec<ProbeTarget>,
}

/// Scripted server shared between the launcher, its children and the test.
///
/// The fake also acts as the health probe: it answers healthy whenever a
/// live child exists and [`FakeServer::set_healthy`] has not turned it off.
#[derive(Debug, Clone)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
    healthy: Arc<AtomicBool>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("fake server mutex poisoned")
    }

    pub fn fail_spawn(&self) {
        self.state().fail_spawn = true;
    }

    pub fn exit_on_spawn(&self, code: i32) {
        self.state().exit_on_spawn = Some(ChildExit {
            code: Some(code),
            signal: None,
        });
    }

    pub fn ignore_term(&self) {
        self.state().ignore_term = true;
    }

    pub fn ignore_kill(&self) {
        self.state().ignore_kill = true;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Makes the current child exit as if it crashed.
    pub fn crash(&self) {
        self.state().exited = Some(ChildExit {
            code: Some(1),
            signal: None,
        });
    }

    pub fn launches(&self) -> u32 {
        self.state().launches
    }

    pub fn signals(&self) -> Vec<Delivered> {
        self.state().signals.clone()
    }

    pub fn probed_ports(&self) -> Vec<u16> {
        self.state().probes.iter().map(|target| target.port).collect()
    }

    pub fn is_alive(&self) -> bool {
        let state = self.state();
        state.launches > 0 && state.exited.is_none()
    }
}

impl ServerLauncher for FakeServer {
    fn launch(&self, _spec: &crate::process::LaunchSpec) -> io::Result<Box<dyn ServerChild>> {
        let mut state = self.state();
        if state.fail_spawn {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }
        state.launches += 1;
        state.exited = state.exit_on_spawn;
        state.signals.clear();
        Ok(Box::new(FakeChild {
            pid: 4000 + state.launches,
            server: self.clone(),
        }))
    }
}

impl HealthProbe for FakeServer {
    fn probe(&self, target: &ProbeTarget) -> HealthCheck {
        let mut state = self.state();
        state.probes.push(target.clone());
        if state.exited.is_none() && self.healthy.load(Ordering::SeqCst) {
            HealthCheck::answered(ServerReport {
                version: "fake".to_owned(),
                protocol: 0,
                players_online: 0,
                players_max: 20,
                motd: format!("fake server on {}", target.port),
            })
        } else {
            HealthCheck::unhealthy("connection refused")
        }
    }
}

struct FakeChild {
    pid: u32,
    server: FakeServer,
}

impl ServerChild for FakeChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self.server.state().exited)
    }

    fn terminate(&mut self) -> io::Result<()> {
        let mut state = self.server.state();
        state.signals.push(Delivered::Term);
        if !state.ignore_term && state.exited.is_none() {
            state.exited = Some(ChildExit {
                code: None,
                signal: Some(15),
            });
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        let mut state = self.server.state();
        state.signals.push(Delivered::Kill);
        if !state.ignore_kill && state.exited.is_none() {
            state.exited = Some(ChildExit {
                code: None,
                signal: Some(9),
            });
        }
        Ok(())
    }
}

/// Short bounds so timeouts resolve quickly in tests.
pub fn fast_timing() -> ProcessTiming {
    ProcessTiming {
        startup_timeout: Duration::from_millis(150),
        shutdown_grace: Duration::from_millis(60),
        kill_timeout: Duration::from_millis(60),
        poll_interval: Duration::from_millis(5),
    }
}
