//! Hot captures against a mocked save bridge.

use std::sync::Arc;

use camino::Utf8PathBuf;
use mockall::Sequence;
use podcraft_config::SnapshotPolicy;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::cancel::CancelToken;
use crate::config_gate::ConfigGate;
use crate::coordinator::{ErrorKind, IntentDetail, IntentResult, Lifecycle, LifecycleIntent, LifecycleParts};
use crate::process::{LaunchSpec, ProcessHandle};
use crate::rcon_bridge::{BridgeError, MockConfigApplier, MockWorldFlusher};
use crate::snapshot::SnapshotEngine;
use crate::world::WorldStore;

use super::support::{FakeServer, RecordingHealthReporter, fast_timing, write_file};

struct Mounts {
    dir: TempDir,
    server: FakeServer,
}

impl Mounts {
    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf())
            .expect("temporary directory path was not valid UTF-8")
    }

    fn lifecycle(&self, flusher: MockWorldFlusher) -> Lifecycle {
        let root = self.root();
        write_file(&root.join("world/level.dat"), b"level");
        let spec = LaunchSpec {
            program: "fake-server".to_owned(),
            args: Vec::new(),
            workdir: root.clone(),
        };
        let mut applier = MockConfigApplier::new();
        applier.expect_apply().never();
        Lifecycle::new(LifecycleParts {
            process: ProcessHandle::new(
                spec,
                Box::new(self.server.clone()),
                Box::new(self.server.clone()),
                fast_timing(),
            ),
            world: WorldStore::open(root.join("world")).expect("open world"),
            snapshots: SnapshotEngine::open(root.join("snapshot")).expect("open snapshots"),
            config: ConfigGate::open(root.join("server.properties"), Box::new(applier))
                .expect("open server properties"),
            flusher: Box::new(flusher),
            policy: SnapshotPolicy::Hot,
            retain: 0,
            reporter: Arc::new(RecordingHealthReporter::default()),
        })
    }
}

#[fixture]
fn mounts() -> Mounts {
    Mounts {
        dir: TempDir::new().expect("failed to create temporary directory"),
        server: FakeServer::new(),
    }
}

fn run(lifecycle: &mut Lifecycle, intent: LifecycleIntent) -> IntentResult {
    lifecycle.execute(intent, &CancelToken::new())
}

fn list_len(lifecycle: &mut Lifecycle) -> usize {
    match run(lifecycle, LifecycleIntent::ListSnapshots).detail() {
        Some(IntentDetail::Snapshots(list)) => list.len(),
        other => panic!("unexpected listing {other:?}"),
    }
}

#[rstest]
fn saves_are_suspended_around_the_copy(mounts: Mounts) {
    let mut flusher = MockWorldFlusher::new();
    let mut order = Sequence::new();
    flusher
        .expect_suspend_saves()
        .times(1)
        .in_sequence(&mut order)
        .returning(|_| Ok(()));
    flusher
        .expect_resume_saves()
        .times(1)
        .in_sequence(&mut order)
        .returning(|_| Ok(()));
    let mut lifecycle = mounts.lifecycle(flusher);

    assert!(matches!(run(&mut lifecycle, LifecycleIntent::Start), IntentResult::Completed(_)));
    assert!(matches!(run(&mut lifecycle, LifecycleIntent::Snapshot), IntentResult::Completed(_)));
    assert_eq!(mounts.server.launches(), 1);
    assert_eq!(list_len(&mut lifecycle), 1);
}

#[rstest]
fn refused_suspend_fails_capture_and_resumes(mounts: Mounts) {
    let mut flusher = MockWorldFlusher::new();
    flusher
        .expect_suspend_saves()
        .times(1)
        .returning(|_| Err(BridgeError::Disabled));
    flusher.expect_resume_saves().times(1).returning(|_| Ok(()));
    let mut lifecycle = mounts.lifecycle(flusher);

    run(&mut lifecycle, LifecycleIntent::Start);
    match run(&mut lifecycle, LifecycleIntent::Snapshot) {
        IntentResult::Failed(error) => assert_eq!(error.kind(), ErrorKind::CaptureFailure),
        other => panic!("expected a failed capture, got {other:?}"),
    }
    assert_eq!(list_len(&mut lifecycle), 0);
    assert!(mounts.server.is_alive());
}

#[rstest]
fn failed_resume_keeps_the_published_snapshot(mounts: Mounts) {
    let mut flusher = MockWorldFlusher::new();
    flusher.expect_suspend_saves().times(1).returning(|_| Ok(()));
    flusher
        .expect_resume_saves()
        .times(1)
        .returning(|_| Err(BridgeError::Disabled));
    let mut lifecycle = mounts.lifecycle(flusher);

    run(&mut lifecycle, LifecycleIntent::Start);
    assert!(matches!(run(&mut lifecycle, LifecycleIntent::Snapshot), IntentResult::Completed(_)));
    assert_eq!(list_len(&mut lifecycle), 1);
}

#[rstest]
fn stopped_server_skips_the_bridge(mounts: Mounts) {
    let mut flusher = MockWorldFlusher::new();
    flusher.expect_suspend_saves().never();
    flusher.expect_resume_saves().never();
    let mut lifecycle = mounts.lifecycle(flusher);

    assert!(matches!(run(&mut lifecycle, LifecycleIntent::Snapshot), IntentResult::Completed(_)));
    assert_eq!(mounts.server.launches(), 0);
}
