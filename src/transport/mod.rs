//! Transport seam between the connection manager and the network.
//!
//! A [`Transport`] turns a [`SessionTarget`] into a running session that
//! owns its own retry loop, the way a STOMP client library does. The
//! manager observes it through [`TransportEvent`]s and steers it with
//! [`TransportCommand`]s; it never touches sockets directly.

pub mod stomp_tcp;

pub use stomp_tcp::StompTransport;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Login and passcode presented to the gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Passcode.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    /// Gateway host name or address.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Optional credentials.
    pub credentials: Option<Credentials>,
}

impl SessionTarget {
    /// Creates an anonymous target.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    /// Adds credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Tuning knobs for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Pause between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Limit for TCP connect plus session handshake.
    pub connect_timeout: Duration,
    /// Outgoing heart-beat interval; zero disables heart-beats.
    pub heartbeat: Duration,
    /// Drop the session after this long without inbound bytes; zero disables.
    pub idle_timeout: Duration,
    /// Largest accepted frame.
    pub max_frame_bytes: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(5_000),
            connect_timeout: Duration::from_millis(10_000),
            heartbeat: Duration::from_millis(10_000),
            idle_timeout: Duration::ZERO,
            max_frame_bytes: crate::stomp::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The gateway acknowledged the session.
    Connected {
        /// Protocol version the gateway agreed to, if reported.
        version: Option<String>,
    },
    /// A frame arrived on a subscribed destination.
    Frame {
        /// Destination the frame was published to.
        destination: String,
        /// Subscription id the gateway matched, if reported.
        subscription: Option<String>,
        /// Frame body as text.
        body: String,
        /// Real time of receipt.
        received_at: DateTime<Utc>,
    },
    /// The gateway sent a protocol-level error.
    ProtocolError {
        /// The error's `message` header, or its body.
        message: String,
    },
    /// The connection attempt or the live session failed.
    Failed {
        /// Description of the failure.
        reason: String,
    },
    /// The transport is about to retry after a failure.
    Reconnecting {
        /// Retry number, starting at 1.
        attempt: u32,
    },
}

/// Instruction sent to a running transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Subscribe the current session to a destination.
    Subscribe {
        /// Subscription id.
        id: String,
        /// Destination name.
        destination: String,
    },
    /// Publish a body to a destination.
    Send {
        /// Destination name.
        destination: String,
        /// Serialized body.
        body: String,
    },
    /// Close any open session and stop retrying.
    Deactivate,
}

/// Channels of one activated transport.
#[derive(Debug)]
pub struct TransportSession {
    /// Events in the order the transport observed them.
    pub events: mpsc::Receiver<TransportEvent>,
    /// Command channel into the transport.
    pub control: mpsc::UnboundedSender<TransportCommand>,
}

/// A network transport able to run feed sessions.
///
/// `activate` must return immediately; all I/O happens on tasks the
/// transport spawns. The session ends after [`TransportCommand::Deactivate`]
/// or once the control channel is closed.
pub trait Transport: fmt::Debug + Send + Sync + 'static {
    /// Starts a session against `target`.
    fn activate(&self, target: &SessionTarget) -> TransportSession;
}
