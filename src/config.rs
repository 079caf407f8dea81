//! Feed configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unparsable numeric values fall back to
//! their defaults; the gateway port, the listen address and the
//! destination list are validated.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::FeedError;
use crate::service::FeedSettings;
use crate::stomp::DEFAULT_MAX_FRAME_BYTES;
use crate::transport::{SessionTarget, TransportOptions};

const DEFAULT_DESTINATIONS: &str = "/topic/TD_ALL_SIG_AREA,/topic/TRAIN_MVT_ALL_TOC,/topic/SimSig";

/// Top-level feed configuration.
///
/// Loaded once at startup via [`FeedConfig::from_env`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Gateway host name or address.
    pub gateway_host: String,

    /// Gateway STOMP port.
    pub gateway_port: u16,

    /// Login name; used only together with `gateway_password`.
    pub gateway_username: Option<String>,

    /// Passcode; used only together with `gateway_username`.
    pub gateway_password: Option<String>,

    /// Destinations subscribed on every connection.
    pub destinations: Vec<String>,

    /// Destination outbound commands are sent to.
    pub command_destination: String,

    /// Milliseconds between transport reconnect attempts.
    pub reconnect_delay_ms: u64,

    /// Milliseconds allowed for TCP connect plus handshake.
    pub connect_timeout_ms: u64,

    /// Outgoing heart-beat interval in milliseconds (0 = off).
    pub heartbeat_ms: u64,

    /// Inbound silence tolerated before dropping the session (0 = off).
    pub idle_timeout_ms: u64,

    /// Largest accepted STOMP frame in bytes.
    pub max_frame_bytes: usize,

    /// Whether to connect on startup.
    pub autoconnect: bool,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Master switch for the local control API.
    pub api_enabled: bool,

    /// Socket address to bind the control API to.
    pub listen_addr: SocketAddr,
}

impl FeedConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` first to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidConfig`] on an invalid port, listen
    /// address or an empty destination list.
    pub fn from_env() -> Result<Self, FeedError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`FeedConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FeedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gateway_port = match lookup("GATEWAY_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|err| {
                FeedError::InvalidConfig(format!("GATEWAY_PORT={raw:?}: {err}"))
            })?,
            None => 51_515,
        };

        let listen_raw = lookup("LISTEN_ADDR").unwrap_or_else(|| "127.0.0.1:3080".to_string());
        let listen_addr = listen_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|err| FeedError::InvalidConfig(format!("LISTEN_ADDR={listen_raw:?}: {err}")))?;

        let destinations = split_list(
            &lookup("FEED_DESTINATIONS").unwrap_or_else(|| DEFAULT_DESTINATIONS.to_string()),
        );
        if destinations.is_empty() {
            return Err(FeedError::InvalidConfig(
                "FEED_DESTINATIONS names no destination".to_string(),
            ));
        }

        Ok(Self {
            gateway_host: non_empty(lookup("GATEWAY_HOST")).unwrap_or_else(|| "localhost".to_string()),
            gateway_port,
            gateway_username: non_empty(lookup("GATEWAY_USERNAME")),
            gateway_password: non_empty(lookup("GATEWAY_PASSWORD")),
            destinations,
            command_destination: non_empty(lookup("FEED_COMMAND_DESTINATION"))
                .unwrap_or_else(|| "/topic/SimSig".to_string()),
            reconnect_delay_ms: parse_or(&lookup, "FEED_RECONNECT_DELAY_MS", 5_000),
            connect_timeout_ms: parse_or(&lookup, "FEED_CONNECT_TIMEOUT_MS", 10_000),
            heartbeat_ms: parse_or(&lookup, "FEED_HEARTBEAT_MS", 10_000),
            idle_timeout_ms: parse_or(&lookup, "FEED_IDLE_TIMEOUT_MS", 0),
            max_frame_bytes: parse_or(&lookup, "FEED_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES),
            autoconnect: parse_bool_or(&lookup, "FEED_AUTOCONNECT", true),
            event_bus_capacity: parse_or(&lookup, "EVENT_BUS_CAPACITY", 10_000),
            api_enabled: parse_bool_or(&lookup, "API_ENABLED", true),
            listen_addr,
        })
    }

    /// Gateway target, with credentials only when both are configured.
    #[must_use]
    pub fn session_target(&self) -> SessionTarget {
        let target = SessionTarget::new(self.gateway_host.clone(), self.gateway_port);
        match (&self.gateway_username, &self.gateway_password) {
            (Some(username), Some(password)) => target.with_credentials(username, password),
            _ => target,
        }
    }

    /// Transport tuning derived from the configuration.
    #[must_use]
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            heartbeat: Duration::from_millis(self.heartbeat_ms),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            max_frame_bytes: self.max_frame_bytes,
        }
    }

    /// Subscription and command destinations.
    #[must_use]
    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            destinations: self.destinations.clone(),
            command_destination: self.command_destination.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `key` as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
