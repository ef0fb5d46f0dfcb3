//! Server provider wiring the fakes into bootstrap.

use podcraft_config::Config;

use crate::bootstrap::ServerProvider;
use crate::process::{HealthProbe, ServerLauncher};
use crate::rcon_bridge::{ConfigApplier, WorldFlusher};

use super::bridge::RecordingBridge;
use super::fakes::FakeServer;

/// Hands out clones of one [`FakeServer`] and one [`RecordingBridge`].
#[derive(Debug, Clone, Default)]
pub struct TestServerProvider {
    pub server: FakeServer,
    pub bridge: RecordingBridge,
}

impl ServerProvider for TestServerProvider {
    fn launcher(&self, _config: &Config) -> Box<dyn ServerLauncher> {
        Box::new(self.server.clone())
    }

    fn probe(&self, _config: &Config) -> Box<dyn HealthProbe> {
        Box::new(self.server.clone())
    }

    fn flusher(&self, _config: &Config) -> Box<dyn WorldFlusher> {
        Box::new(self.bridge.clone())
    }

    fn applier(&self, _config: &Config) -> Box<dyn ConfigApplier> {
        Box::new(self.bridge.clone())
    }
}
