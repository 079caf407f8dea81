//! Request and response bodies of the feed control endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::ConnectionStatus;
use crate::error::FeedError;
use crate::transport::SessionTarget;

/// Body of `POST /api/v1/feed/connect`.
///
/// Every field is optional; missing fields fall back to the configured
/// gateway target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectRequest {
    /// Gateway host.
    #[serde(default)]
    pub host: Option<String>,
    /// Gateway port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Login name.
    #[serde(default)]
    pub username: Option<String>,
    /// Passcode.
    #[serde(default)]
    pub password: Option<String>,
}

impl ConnectRequest {
    /// Resolves the request against `defaults`.
    ///
    /// Credentials from the request replace the configured ones only when
    /// both halves are given.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidRequest`] for an empty host or port 0.
    pub fn into_target(self, defaults: &SessionTarget) -> Result<SessionTarget, FeedError> {
        let host = self.host.unwrap_or_else(|| defaults.host.clone());
        if host.trim().is_empty() {
            return Err(FeedError::InvalidRequest("host must not be empty".to_string()));
        }
        let port = self.port.unwrap_or(defaults.port);
        if port == 0 {
            return Err(FeedError::InvalidRequest("port must be non-zero".to_string()));
        }

        let target = SessionTarget::new(host.trim(), port);
        Ok(match (self.username, self.password) {
            (Some(username), Some(password)) => target.with_credentials(username, password),
            _ => SessionTarget {
                credentials: defaults.credentials.clone(),
                ..target
            },
        })
    }
}

/// Response carrying only a status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusOnlyResponse {
    /// Connection status after the request.
    pub status: ConnectionStatus,
}

/// Response of `GET /api/v1/feed/status`.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatusResponse {
    /// Current connection status.
    pub status: ConnectionStatus,
    /// Number of signals seen on the current session.
    pub known_signals: usize,
    /// Subscribed destinations.
    pub destinations: Vec<String>,
    /// Destination commands are sent to.
    pub command_destination: String,
}

/// Response of `GET /api/v1/clock`.
#[derive(Debug, Clone, Serialize)]
pub struct ClockResponse {
    /// Simulation area.
    pub area_id: String,
    /// Simulated seconds at the last update.
    pub simulated_seconds: u64,
    /// Real milliseconds per simulated tick.
    pub tick_interval_ms: u64,
    /// Whether the simulation is paused.
    pub paused: bool,
    /// Simulated seconds per real second.
    pub speed_ratio: f64,
    /// Simulated seconds interpolated to now.
    pub displayed_seconds: u64,
    /// `displayed_seconds` as `HH:MM:SS`.
    pub display: String,
}

/// Response of `POST /api/v1/signals/danger`.
#[derive(Debug, Clone, Serialize)]
pub struct DangerResponse {
    /// Number of danger commands issued.
    pub commands_issued: usize,
}

/// Response of `POST /api/v1/commands`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandAccepted {
    /// Whether the command was handed to the transport.
    pub sent: bool,
}
