//! Recording stand-in for the RCON bridge.

use std::sync::{Arc, Mutex};

use crate::config_gate::ServerConfig;
use crate::rcon_bridge::{BridgeError, ConfigApplier, WorldFlusher};

/// Logs every server-side effect instead of sending it.
///
/// Commands are recorded as `save-off`, `save-on` and `apply key=value`.
#[derive(Debug, Clone, Default)]
pub struct RecordingBridge {
    commands: Arc<Mutex<Vec<String>>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("bridge mutex poisoned").clone()
    }

    fn record(&self, command: String) {
        self.commands
            .lock()
            .expect("bridge mutex poisoned")
            .push(command);
    }
}

impl WorldFlusher for RecordingBridge {
    fn suspend_saves(&self, _config: &ServerConfig) -> Result<(), BridgeError> {
        self.record("save-off".to_owned());
        Ok(())
    }

    fn resume_saves(&self, _config: &ServerConfig) -> Result<(), BridgeError> {
        self.record("save-on".to_owned());
        Ok(())
    }
}

impl ConfigApplier for RecordingBridge {
    fn apply(&self, _config: &ServerConfig, key: &str, value: &str) -> Result<(), BridgeError> {
        self.record(format!("apply {key}={value}"));
        Ok(())
    }
}
