use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the daemon renders its log lines, including relayed plugin stderr.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with flattened fields.
    #[default]
    Json,
    /// Single line text for terminals.
    Compact,
}

impl LogFormat {
    /// Whether terminal colour codes may be emitted in this format.
    #[must_use]
    pub const fn allows_ansi(self) -> bool {
        matches!(self, Self::Compact)
    }
}

/// Error returned when a `log_format` value names no known format.
pub type LogFormatParseError = strum::ParseError;
