//! STOMP frame model and builders.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use super::StompError;

/// STOMP frame commands used by the feed client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompCommand {
    /// Client: open a session.
    Connect,
    /// Client: open a session (1.2 spelling).
    Stomp,
    /// Server: session accepted.
    Connected,
    /// Client: publish to a destination.
    Send,
    /// Client: subscribe to a destination.
    Subscribe,
    /// Client: cancel a subscription.
    Unsubscribe,
    /// Client: close the session.
    Disconnect,
    /// Server: a message on a subscribed destination.
    Message,
    /// Server: receipt for a client frame.
    Receipt,
    /// Server: protocol error; the server closes the connection after it.
    Error,
}

impl StompCommand {
    /// Returns the wire spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Header values of `CONNECT`/`CONNECTED` frames are not escaped.
    #[must_use]
    pub const fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StompCommand {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "STOMP" => Ok(Self::Stomp),
            "CONNECTED" => Ok(Self::Connected),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "DISCONNECT" => Ok(Self::Disconnect),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(StompError::UnknownCommand(other.to_string())),
        }
    }
}

/// One STOMP frame.
///
/// Headers keep wire order; lookups return the first occurrence, as
/// STOMP 1.2 requires for repeated headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: StompCommand,
    /// Header entries in wire order.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Bytes,
}

impl Frame {
    /// Creates a frame with no headers and an empty body.
    #[must_use]
    pub const fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the first value of header `key`.
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as UTF-8 text, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Builds a `CONNECT` frame.
    ///
    /// `heartbeat_out_ms` is the interval at which this client promises to
    /// send heart-beats; the client never asks for server heart-beats.
    #[must_use]
    pub fn connect(host: &str, login: Option<(&str, &str)>, heartbeat_out_ms: u64) -> Self {
        let mut frame = Self::new(StompCommand::Connect)
            .header("accept-version", "1.0,1.1,1.2")
            .header("host", host)
            .header("heart-beat", format!("{heartbeat_out_ms},0"));
        if let Some((login, passcode)) = login {
            frame = frame.header("login", login).header("passcode", passcode);
        }
        frame
    }

    /// Builds a `SUBSCRIBE` frame with automatic acknowledgment.
    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(StompCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// Builds a `SEND` frame carrying a JSON body.
    #[must_use]
    pub fn send_json(destination: &str, body: impl Into<Bytes>) -> Self {
        Self::new(StompCommand::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .with_body(body)
    }

    /// Builds a `DISCONNECT` frame.
    #[must_use]
    pub const fn disconnect() -> Self {
        Self::new(StompCommand::Disconnect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_through_str() {
        for command in [
            StompCommand::Connected,
            StompCommand::Message,
            StompCommand::Error,
            StompCommand::Receipt,
        ] {
            assert_eq!(command.as_str().parse::<StompCommand>().ok(), Some(command));
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!("PING".parse::<StompCommand>().is_err());
    }

    #[test]
    fn first_header_occurrence_wins() {
        let frame = Frame::new(StompCommand::Message)
            .header("destination", "/topic/a")
            .header("destination", "/topic/b");
        assert_eq!(frame.get_header("destination"), Some("/topic/a"));
    }

    #[test]
    fn connect_includes_credentials_when_given() {
        let frame = Frame::connect("gw", Some(("user", "secret")), 10_000);
        assert_eq!(frame.get_header("login"), Some("user"));
        assert_eq!(frame.get_header("passcode"), Some("secret"));
        assert_eq!(frame.get_header("heart-beat"), Some("10000,0"));

        let anonymous = Frame::connect("gw", None, 0);
        assert_eq!(anonymous.get_header("login"), None);
    }

    #[test]
    fn connect_frames_do_not_escape() {
        assert!(!StompCommand::Connect.escapes_headers());
        assert!(StompCommand::Send.escapes_headers());
    }
}
