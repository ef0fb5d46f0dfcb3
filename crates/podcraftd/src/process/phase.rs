//! Observable state of the supervised server.

use std::fmt;

use serde::Serialize;

use super::probe::ServerReport;

/// Lifecycle phase of the supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessPhase {
    /// No child process exists.
    Stopped,
    /// Spawned; waiting for the first healthy probe.
    Starting,
    /// Healthy and serving.
    Running,
    /// Termination requested; waiting for exit.
    Stopping,
    /// Exited without being asked to, or never became healthy.
    Crashed,
}

impl ProcessPhase {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Crashed => "crashed",
        }
    }
}

impl fmt::Display for ProcessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    /// Whether the server answered.
    pub healthy: bool,
    /// Probe diagnostics, such as the connection error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Version, player counts and MOTD when the server answered a status
    /// query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerReport>,
}

impl HealthCheck {
    /// A successful probe that returned the server's own report.
    #[must_use]
    pub const fn answered(report: ServerReport) -> Self {
        Self {
            healthy: true,
            detail: None,
            server: Some(report),
        }
    }

    /// A failed probe with its reason.
    #[must_use]
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: Some(detail.into()),
            server: None,
        }
    }
}

/// Point-in-time view of the supervised server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    /// Current phase.
    pub phase: ProcessPhase,
    /// OS process id while a child exists.
    pub pid: Option<u32>,
    /// RFC 3339 time the current child was spawned.
    pub started_at: Option<String>,
    /// Most recent probe result.
    pub last_health: Option<HealthCheck>,
    /// Config revision the current child was started with.
    pub active_revision: Option<u64>,
    /// Port the current child was started on.
    pub listen_port: Option<u16>,
}

impl ProcessStatus {
    pub(crate) const fn stopped() -> Self {
        Self {
            phase: ProcessPhase::Stopped,
            pid: None,
            started_at: None,
            last_health: None,
            active_revision: None,
            listen_port: None,
        }
    }
}
