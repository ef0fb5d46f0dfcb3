//! Behavioural tests covering the daemon runtime and its control socket.

use std::cell::RefCell;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use crate::health::HealthReporter;
use crate::runtime::{
    LaunchError, LaunchPlan, ProcessControl, ServiceDeps, ShutdownError, ShutdownSignal,
    run_daemon_with,
};

use super::support::{Delivered, RecordingHealthReporter, TestConfigLoader, TestServerProvider};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

type StepResult = Result<(), String>;

#[derive(Clone)]
struct TestShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        *triggered = true;
        cvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        while !*triggered {
            triggered = cvar
                .wait(triggered)
                .expect("shutdown mutex poisoned during wait");
        }
        Ok(())
    }
}

struct DaemonWorld {
    loader: TestConfigLoader,
    provider: TestServerProvider,
    reporter: Arc<RecordingHealthReporter>,
    shutdown: TestShutdownSignal,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
    response: Option<Value>,
}

impl DaemonWorld {
    fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            provider: TestServerProvider::default(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            shutdown: TestShutdownSignal::new(),
            handle: None,
            result: None,
            response: None,
        }
    }

    fn plan(
        &self,
        shutdown: TestShutdownSignal,
    ) -> LaunchPlan<TestConfigLoader, TestShutdownSignal, TestServerProvider> {
        LaunchPlan {
            process: ProcessControl { shutdown },
            services: ServiceDeps {
                loader: self.loader.clone(),
                reporter: self.reporter.clone() as Arc<dyn HealthReporter>,
                provider: self.provider.clone(),
            },
        }
    }

    fn start(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err("daemon already running".to_owned());
        }
        let plan = self.plan(self.shutdown.clone());
        self.handle = Some(thread::spawn(move || run_daemon_with(plan)));
        self.wait_for_ready()
    }

    fn wait_for_ready(&self) -> StepResult {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if self
                .read_health()
                .is_ok_and(|health| health["status"] == "ready")
            {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err("daemon did not publish a ready health snapshot".to_owned())
    }

    fn join(&mut self) -> StepResult {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "daemon not running".to_owned())?;
        let result = handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?;
        self.result = Some(result);
        Ok(())
    }

    fn runtime_file(&self, name: &str) -> Utf8PathBuf {
        self.loader.runtime_dir().join(name)
    }

    fn read_health(&self) -> Result<Value, String> {
        let content = fs::read_to_string(self.runtime_file("podcraftd.health"))
            .map_err(|error| error.to_string())?;
        serde_json::from_str(&content).map_err(|error| error.to_string())
    }

    fn send_line(&mut self, line: &str) -> StepResult {
        let mut stream =
            UnixStream::connect(self.loader.socket_path()).map_err(|error| error.to_string())?;
        stream
            .set_read_timeout(Some(WAIT_TIMEOUT))
            .map_err(|error| error.to_string())?;
        stream
            .write_all(format!("{line}\n").as_bytes())
            .map_err(|error| error.to_string())?;
        let mut reply = String::new();
        BufReader::new(stream)
            .read_line(&mut reply)
            .map_err(|error| error.to_string())?;
        let value = serde_json::from_str(&reply).map_err(|error| format!("{error}: {reply}"))?;
        self.response = Some(value);
        Ok(())
    }

    fn response(&self) -> Result<&Value, String> {
        self.response
            .as_ref()
            .ok_or_else(|| "no response received".to_owned())
    }
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<DaemonWorld> {
    RefCell::new(DaemonWorld::new())
}

#[given("a fresh daemon process world")]
fn given_world(world: &RefCell<DaemonWorld>) {
    assert!(world.borrow().handle.is_none());
}

#[given("stale runtime files exist")]
fn given_stale_runtime(world: &RefCell<DaemonWorld>) -> StepResult {
    let world = world.borrow();
    fs::create_dir_all(world.loader.runtime_dir()).map_err(|error| error.to_string())?;
    fs::write(world.runtime_file("podcraftd.lock"), b"").map_err(|error| error.to_string())?;
    fs::write(world.runtime_file("podcraftd.pid"), b"0\n").map_err(|error| error.to_string())?;
    Ok(())
}

#[when("the daemon starts")]
fn when_daemon_starts(world: &RefCell<DaemonWorld>) -> StepResult {
    world.borrow_mut().start()
}

#[when("shutdown is triggered")]
fn when_shutdown_triggered(world: &RefCell<DaemonWorld>) {
    world.borrow().shutdown.trigger();
}

#[when("the daemon run completes")]
fn when_daemon_completes(world: &RefCell<DaemonWorld>) -> StepResult {
    world.borrow_mut().join()
}

#[when("a client sends a \"{kind}\" intent")]
fn when_client_sends(world: &RefCell<DaemonWorld>, kind: String) -> StepResult {
    let line = json!({ "intent": { "kind": kind } }).to_string();
    world.borrow_mut().send_line(&line)
}

#[when("a client sends a \"{kind}\" intent for snapshot {id}")]
fn when_client_sends_for_snapshot(
    world: &RefCell<DaemonWorld>,
    kind: String,
    id: u64,
) -> StepResult {
    let line = json!({ "intent": { "kind": kind, "id": format!("{id:06}") } }).to_string();
    world.borrow_mut().send_line(&line)
}

#[when("a client sends a malformed line")]
fn when_client_sends_malformed(world: &RefCell<DaemonWorld>) -> StepResult {
    world.borrow_mut().send_line("{\"intent\": ")
}

#[then("the daemon wrote the pid file")]
fn then_pid_file(world: &RefCell<DaemonWorld>) {
    let content = fs::read_to_string(world.borrow().runtime_file("podcraftd.pid"))
        .expect("pid file should be readable");
    let pid: u32 = content
        .trim()
        .parse()
        .expect("pid file should contain an integer");
    assert_eq!(pid, std::process::id());
}

#[then("the daemon wrote the ready health snapshot")]
fn then_health_ready(world: &RefCell<DaemonWorld>) {
    let health = world
        .borrow()
        .read_health()
        .expect("health snapshot should parse");
    assert_eq!(health["status"], "ready");
    assert_eq!(health["pid"], std::process::id());
}

#[then("the runtime files are removed")]
fn then_runtime_removed(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    for name in ["podcraftd.lock", "podcraftd.pid", "podcraftd.health"] {
        assert!(
            !world.runtime_file(name).exists(),
            "{name} should be removed after shutdown"
        );
    }
}

#[then("the daemon run succeeds")]
fn then_daemon_succeeds(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    let result = world.result.as_ref().expect("expected a recorded daemon result");
    assert!(result.is_ok(), "daemon run should succeed: {result:?}");
}

#[then("starting the daemon again fails with already running")]
fn then_duplicate_start_fails(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    let result = run_daemon_with(world.plan(TestShutdownSignal::new()));
    match result {
        Err(LaunchError::AlreadyRunning { pid }) => assert_eq!(pid, std::process::id()),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
}

#[then("the client receives a \"{outcome}\" outcome")]
fn then_outcome(world: &RefCell<DaemonWorld>, outcome: String) -> StepResult {
    let world = world.borrow();
    let response = world.response()?;
    if response["outcome"] == outcome.as_str() {
        Ok(())
    } else {
        Err(format!("unexpected response {response}"))
    }
}

#[then("the client receives a \"{outcome}\" outcome with kind \"{kind}\"")]
fn then_outcome_kind(world: &RefCell<DaemonWorld>, outcome: String, kind: String) -> StepResult {
    let world = world.borrow();
    let response = world.response()?;
    if response["outcome"] == outcome.as_str() && response["error"]["kind"] == kind.as_str() {
        Ok(())
    } else {
        Err(format!("unexpected response {response}"))
    }
}

#[then("the server received a graceful stop")]
fn then_graceful_stop(world: &RefCell<DaemonWorld>) {
    let world = world.borrow();
    let server = &world.provider.server;
    assert_eq!(server.signals(), vec![Delivered::Term]);
    assert!(!server.is_alive());
}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "Runtime files track the daemon"
)]
fn runtime_files_track_daemon(#[from(world)] _: RefCell<DaemonWorld>) {}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "Intents are served over the control socket"
)]
fn intents_served_over_socket(#[from(world)] _: RefCell<DaemonWorld>) {}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "A second daemon refuses to start"
)]
fn second_daemon_refused(#[from(world)] _: RefCell<DaemonWorld>) {}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "Stale runtime files are reclaimed"
)]
fn stale_runtime_reclaimed(#[from(world)] _: RefCell<DaemonWorld>) {}
