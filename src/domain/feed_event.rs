//! Events emitted by the connection manager.
//!
//! Every status transition, decoded message and surfaced error is
//! published as a [`FeedEvent`] through the [`super::EventBus`].
//! Consumers (UI, voice, train tracking) subscribe to the bus instead of
//! registering callbacks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::DomainMessage;

/// Lifecycle state of one connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No session. Initial state, re-enterable.
    Disconnected,
    /// Transport activated, waiting for the gateway's acknowledgment.
    Connecting,
    /// Session acknowledged and subscribed.
    Connected,
    /// Session dropped after having connected; the transport is retrying.
    Reconnecting,
}

impl ConnectionStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Status notification delivered to consumers.
///
/// Mirrors [`ConnectionStatus`] plus `NoGateway`, reported once when the
/// gateway was never reachable and retries were abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChange {
    /// See [`ConnectionStatus::Connecting`].
    Connecting,
    /// See [`ConnectionStatus::Connected`].
    Connected,
    /// See [`ConnectionStatus::Reconnecting`].
    Reconnecting,
    /// See [`ConnectionStatus::Disconnected`].
    Disconnected,
    /// The gateway never acknowledged a session; retries stopped.
    NoGateway,
}

impl From<ConnectionStatus> for StatusChange {
    fn from(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Disconnected => Self::Disconnected,
            ConnectionStatus::Connecting => Self::Connecting,
            ConnectionStatus::Connected => Self::Connected,
            ConnectionStatus::Reconnecting => Self::Reconnecting,
        }
    }
}

/// Event published on the feed's event bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// Connection status changed.
    Status {
        /// New status.
        status: StatusChange,
        /// When the change was observed.
        timestamp: DateTime<Utc>,
    },

    /// One decoded message from a subscribed destination.
    Message {
        /// Destination the frame arrived on.
        destination: String,
        /// Decoded message.
        message: DomainMessage,
        /// Real time the frame was received.
        received_at: DateTime<Utc>,
    },

    /// Transport or authentication failure.
    Error {
        /// Error category (see [`crate::error::FeedError::kind_str`]).
        kind: String,
        /// Human-readable description.
        message: String,
        /// When the error was observed.
        timestamp: DateTime<Utc>,
    },
}

impl FeedEvent {
    /// Builds a status event stamped now.
    #[must_use]
    pub fn status(status: StatusChange) -> Self {
        Self::Status {
            status,
            timestamp: Utc::now(),
        }
    }

    /// Builds an error event from a [`crate::error::FeedError`], stamped now.
    #[must_use]
    pub fn error(err: &crate::error::FeedError) -> Self {
        Self::Error {
            kind: err.kind_str().to_string(),
            message: err.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
        }
    }

    /// Returns the destination of a message event.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Message { destination, .. } => Some(destination.as_str()),
            _ => None,
        }
    }
}
