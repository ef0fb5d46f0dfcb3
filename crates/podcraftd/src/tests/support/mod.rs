//! Shared doubles and fixtures for the behavioural suites.

mod bridge;
mod config_loader;
mod fakes;
mod provider;
mod reporter;
mod world;

pub use bridge::RecordingBridge;
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use fakes::{Delivered, FakeServer, fast_timing};
pub use provider::TestServerProvider;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{LifecycleWorld, write_file};
