//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use podcraft_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader pointing every mount and the control socket into one temp dir.
#[derive(Clone)]
pub struct TestConfigLoader {
    dir: Arc<TempDir>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: Arc::new(TempDir::new().expect("failed to create temporary directory")),
        }
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

    pub fn runtime_dir(&self) -> Utf8PathBuf {
        self.root().join("run")
    }

    pub fn socket_path(&self) -> Utf8PathBuf {
        self.runtime_dir().join("podcraftd.sock")
    }

    pub fn config(&self) -> Config {
        Config {
            world_dir: self.world_dir(),
            snapshot_dir: self.snapshot_dir(),
            properties_path: self.root().join("server.properties"),
            server_binary: "fake-server".to_owned(),
            startup_timeout_secs: 2,
            shutdown_grace_secs: 1,
            snapshot_interval_secs: 0,
            autostart: false,
            control_socket: SocketEndpoint::unix(self.socket_path()),
            log_filter: "warn".to_owned(),
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that intentionally fails by passing an unknown CLI flag.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("podcraftd"),
            OsString::from("--no-such-option"),
        ];
        Config::load_from_iter(args)
    }
}
