//! Commands published to the gateway's command destination.

use serde::Serialize;

/// Outbound command, serialized externally tagged.
///
/// `OutboundCommand::Bpull { signal: "S12".into() }` serializes as
/// `{"bpull":{"signal":"S12"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Replace the given signal to its most restrictive (danger) aspect.
    Bpull {
        /// Signal identifier.
        signal: String,
    },
}

impl OutboundCommand {
    /// Builds the command that sets `signal` to danger.
    #[must_use]
    pub fn signal_to_danger(signal: impl Into<String>) -> Self {
        Self::Bpull {
            signal: signal.into(),
        }
    }
}
