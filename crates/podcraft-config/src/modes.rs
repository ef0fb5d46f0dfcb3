//! Enumerated configuration switches.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Log output formats understood by the daemon's subscriber.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event; what container log shippers expect.
    #[default]
    Json,
    /// Terse human-readable lines.
    Compact,
}

/// How a snapshot keeps the live world from changing underneath the copy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SnapshotPolicy {
    /// Stop the server, copy, restart it.
    #[default]
    Cold,
    /// Leave the server running; flush and suspend its saves while copying.
    Hot,
}

/// Error returned when a mode name is not recognised.
pub type ModeParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("cold", SnapshotPolicy::Cold)]
    #[case("HOT", SnapshotPolicy::Hot)]
    fn snapshot_policy_parses_case_insensitively(
        #[case] input: &str,
        #[case] expected: SnapshotPolicy,
    ) {
        assert_eq!(input.parse::<SnapshotPolicy>().ok(), Some(expected));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!("lukewarm".parse::<SnapshotPolicy>().is_err());
    }

    #[test]
    fn log_format_round_trips_through_display() {
        assert_eq!(LogFormat::Compact.to_string(), "compact");
        assert_eq!("json".parse::<LogFormat>().ok(), Some(LogFormat::Json));
    }
}
