use serde::Deserialize;

use super::ControlError;
use crate::coordinator::LifecycleIntent;

const fn wait_by_default() -> bool {
    true
}

/// One request line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlRequest {
    /// Intent to submit.
    pub intent: LifecycleIntent,
    /// Wait for the final result; `false` replies as soon as it is queued.
    #[serde(default = "wait_by_default")]
    pub wait: bool,
}

impl ControlRequest {
    /// Parses a request line, ignoring trailing whitespace.
    pub fn parse(line: &[u8]) -> Result<Self, ControlError> {
        let end = line
            .iter()
            .rposition(|byte| !byte.is_ascii_whitespace())
            .map_or(0, |pos| pos + 1);
        let trimmed = &line[..end];
        if trimmed.is_empty() {
            return Err(ControlError::malformed("empty request line"));
        }
        serde_json::from_slice(trimmed).map_err(ControlError::from_json)
    }
}
