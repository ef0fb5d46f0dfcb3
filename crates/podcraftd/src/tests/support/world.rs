//! Lifecycle test world: a real world directory, snapshot store and
//! properties file driven by a fake server.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use podcraft_config::SnapshotPolicy;

use crate::cancel::CancelToken;
use crate::config_gate::ConfigGate;
use crate::coordinator::{IntentDetail, IntentResult, Lifecycle, LifecycleIntent, LifecycleParts};
use crate::process::{LaunchSpec, ProcessHandle};
use crate::snapshot::{SnapshotEngine, SnapshotId, SnapshotMeta};
use crate::world::WorldStore;

use super::bridge::RecordingBridge;
use super::fakes::{FakeServer, fast_timing};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across lifecycle steps.
pub struct LifecycleWorld {
    dir: TempDir,
    pub server: FakeServer,
    pub bridge: RecordingBridge,
    pub reporter: Arc<RecordingHealthReporter>,
    lifecycle: Option<Lifecycle>,
    policy: SnapshotPolicy,
    pub snapshots: Vec<SnapshotMeta>,
    pub last: Option<IntentResult>,
    pub recorded_world: Option<BTreeMap<String, Vec<u8>>>,
    pub originals: BTreeMap<String, Vec<u8>>,
}

impl LifecycleWorld {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory");
        let world = Self {
            dir,
            server: FakeServer::new(),
            bridge: RecordingBridge::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            lifecycle: None,
            policy: SnapshotPolicy::Cold,
            snapshots: Vec::new(),
            last: None,
            recorded_world: None,
            originals: BTreeMap::new(),
        };
        fs::create_dir_all(world.world_dir()).expect("create world directory");
        world
    }

    pub fn use_policy(&mut self, policy: SnapshotPolicy) {
        self.policy = policy;
        self.lifecycle = None;
    }

    pub fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf())
            .expect("temporary directory path was not valid UTF-8")
    }

    pub fn world_dir(&self) -> Utf8PathBuf {
        self.root().join("world")
    }

    pub fn snapshot_dir(&self) -> Utf8PathBuf {
        self.root().join("snapshot")
    }

    pub fn properties_path(&self) -> Utf8PathBuf {
        self.root().join("server.properties")
    }

    fn lifecycle(&mut self) -> &mut Lifecycle {
        if self.lifecycle.is_none() {
            self.lifecycle = Some(self.assemble());
        }
        self.lifecycle.as_mut().expect("lifecycle assembled above")
    }

    fn assemble(&self) -> Lifecycle {
        let spec = LaunchSpec {
            program: "fake-server".to_owned(),
            args: Vec::new(),
            workdir: self.root(),
        };
        let process = ProcessHandle::new(
            spec,
            Box::new(self.server.clone()),
            Box::new(self.server.clone()),
            fast_timing(),
        );
        Lifecycle::new(LifecycleParts {
            process,
            world: WorldStore::open(self.world_dir()).expect("open world"),
            snapshots: SnapshotEngine::open(self.snapshot_dir()).expect("open snapshots"),
            config: ConfigGate::open(self.properties_path(), Box::new(self.bridge.clone()))
                .expect("open server properties"),
            flusher: Box::new(self.bridge.clone()),
            policy: self.policy,
            retain: 0,
            reporter: self.reporter.clone(),
        })
    }

    /// Hands the assembled lifecycle to a coordinator; the directories stay
    /// alive with the world.
    pub fn take_lifecycle(&mut self) -> Lifecycle {
        self.lifecycle.take().unwrap_or_else(|| self.assemble())
    }

    /// Runs one intent and keeps its result as [`LifecycleWorld::last`].
    pub fn execute(&mut self, intent: LifecycleIntent) -> &IntentResult {
        let result = self.lifecycle().execute(intent, &CancelToken::new());
        if let Some(IntentDetail::Snapshot(meta)) = result.detail() {
            self.snapshots.push(meta.clone());
        }
        self.last.insert(result)
    }

    /// Runs one intent that is expected to complete.
    pub fn complete(&mut self, intent: LifecycleIntent) -> IntentDetail {
        let name = intent.name();
        match self.execute(intent) {
            IntentResult::Completed(detail) => detail.clone(),
            other => panic!("{name} did not complete: {other:?}"),
        }
    }

    /// Id of the `ordinal`th snapshot taken in this scenario, counting from 1.
    pub fn snapshot_id(&self, ordinal: usize) -> SnapshotId {
        self.snapshots
            .get(ordinal - 1)
            .unwrap_or_else(|| panic!("snapshot S{ordinal} was not taken"))
            .id
    }

    pub fn snapshot_meta(&self, ordinal: usize) -> &SnapshotMeta {
        self.snapshots
            .get(ordinal - 1)
            .unwrap_or_else(|| panic!("snapshot S{ordinal} was not taken"))
    }

    pub fn snapshot_world(&self, ordinal: usize) -> Utf8PathBuf {
        self.snapshot_dir()
            .join(self.snapshot_id(ordinal).to_string())
            .join("world")
    }

    /// Every regular file under the world keyed by relative path.
    pub fn world_contents(&self) -> BTreeMap<String, Vec<u8>> {
        let root = self.world_dir();
        WalkDir::new(&root)
            .min_depth(1)
            .into_iter()
            .map(|entry| entry.expect("walk world"))
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .expect("entry under world")
                    .to_string_lossy()
                    .into_owned();
                (relative, fs::read(entry.path()).expect("read world file"))
            })
            .collect()
    }

    pub fn record_world(&mut self) {
        self.recorded_world = Some(self.world_contents());
    }
}

impl Default for LifecycleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_file(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write file");
}
