//! STOMP over plain TCP with a built-in reconnect loop.
//!
//! One spawned task per activation owns the socket. It keeps retrying
//! after every failure, pausing `reconnect_delay` between attempts, until
//! it is deactivated. Policy decisions (giving up on a gateway that never
//! answered, stopping on bad credentials) belong to the connection
//! manager, which deactivates the transport when it wants retries to stop.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::codec::Framed;

use super::{
    SessionTarget, Transport, TransportCommand, TransportEvent, TransportOptions, TransportSession,
};
use crate::stomp::{Frame, StompCodec, StompCommand, StompItem};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

type StompStream = Framed<TcpStream, StompCodec>;

/// TCP transport speaking STOMP to the simulation gateway.
#[derive(Debug, Clone, Default)]
pub struct StompTransport {
    options: TransportOptions,
}

impl StompTransport {
    /// Creates a transport with the given options.
    #[must_use]
    pub const fn new(options: TransportOptions) -> Self {
        Self { options }
    }
}

impl Transport for StompTransport {
    fn activate(&self, target: &SessionTarget) -> TransportSession {
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (control, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_client(
            target.clone(),
            self.options.clone(),
            event_tx,
            control_rx,
        ));
        TransportSession { events, control }
    }
}

/// How one connection attempt or live session ended.
#[derive(Debug)]
enum Outcome {
    Deactivated,
    Rejected(String),
    Failed(String),
}

async fn run_client(
    target: SessionTarget,
    options: TransportOptions,
    events: mpsc::Sender<TransportEvent>,
    mut control: mpsc::UnboundedReceiver<TransportCommand>,
) {
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            tokio::select! {
                () = tokio::time::sleep(options.reconnect_delay) => {}
                () = deactivation(&mut control) => break,
            }
            if events
                .send(TransportEvent::Reconnecting { attempt })
                .await
                .is_err()
            {
                break;
            }
        }
        attempt = attempt.saturating_add(1);

        tracing::debug!(%target, attempt, "opening gateway session");
        let opened = tokio::select! {
            opened = open_session(&target, &options) => opened,
            () = deactivation(&mut control) => break,
        };

        let outcome = match opened {
            Ok((framed, version)) => {
                tracing::info!(%target, version = version.as_deref().unwrap_or("1.0"), "gateway session established");
                if events
                    .send(TransportEvent::Connected { version })
                    .await
                    .is_err()
                {
                    break;
                }
                serve(framed, &options, &events, &mut control).await
            }
            Err(outcome) => outcome,
        };

        let event = match outcome {
            Outcome::Deactivated => break,
            Outcome::Rejected(message) => {
                tracing::warn!(%target, %message, "gateway reported an error");
                TransportEvent::ProtocolError { message }
            }
            Outcome::Failed(reason) => {
                tracing::warn!(%target, %reason, "gateway session failed");
                TransportEvent::Failed { reason }
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
    tracing::debug!(%target, "transport stopped");
}

/// Resolves once the transport is told to stop or its control channel
/// closes. Commands arriving while no session is open are dropped.
async fn deactivation(control: &mut mpsc::UnboundedReceiver<TransportCommand>) {
    loop {
        match control.recv().await {
            Some(TransportCommand::Deactivate) | None => return,
            Some(command) => {
                tracing::debug!(?command, "dropping command while no session is open");
            }
        }
    }
}

async fn open_session(
    target: &SessionTarget,
    options: &TransportOptions,
) -> Result<(StompStream, Option<String>), Outcome> {
    match tokio::time::timeout(options.connect_timeout, handshake(target, options)).await {
        Ok(result) => result,
        Err(_) => Err(Outcome::Failed(format!(
            "handshake with {target} timed out after {:?}",
            options.connect_timeout
        ))),
    }
}

/// Opens the socket, sends `CONNECT` and waits for the gateway's answer.
async fn handshake(
    target: &SessionTarget,
    options: &TransportOptions,
) -> Result<(StompStream, Option<String>), Outcome> {
    let stream = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|err| Outcome::Failed(format!("connect to {target} failed: {err}")))?;
    let _ = stream.set_nodelay(true);

    let mut framed = Framed::new(stream, StompCodec::new(options.max_frame_bytes));
    let login = target
        .credentials
        .as_ref()
        .map(|c| (c.username.as_str(), c.password.as_str()));
    let heartbeat_ms = u64::try_from(options.heartbeat.as_millis()).unwrap_or(u64::MAX);
    framed
        .send(StompItem::Frame(Frame::connect(&target.host, login, heartbeat_ms)))
        .await
        .map_err(|err| Outcome::Failed(err.to_string()))?;

    loop {
        match framed.next().await {
            Some(Ok(StompItem::Heartbeat)) => {}
            Some(Ok(StompItem::Frame(frame))) => {
                return match frame.command {
                    StompCommand::Connected => {
                        let version = frame.get_header("version").map(str::to_string);
                        Ok((framed, version))
                    }
                    StompCommand::Error => Err(Outcome::Rejected(error_message(&frame))),
                    other => Err(Outcome::Failed(format!(
                        "unexpected {other} frame before CONNECTED"
                    ))),
                };
            }
            Some(Err(err)) => return Err(Outcome::Failed(err.to_string())),
            None => {
                return Err(Outcome::Failed(
                    "gateway closed the connection during handshake".to_string(),
                ));
            }
        }
    }
}

/// Runs an established session until it fails or is deactivated.
async fn serve(
    framed: StompStream,
    options: &TransportOptions,
    events: &mpsc::Sender<TransportEvent>,
    control: &mut mpsc::UnboundedReceiver<TransportCommand>,
) -> Outcome {
    let (mut sink, mut stream) = framed.split();
    let mut heartbeat = (!options.heartbeat.is_zero()).then(|| {
        let mut interval =
            tokio::time::interval_at(Instant::now() + options.heartbeat, options.heartbeat);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let idle_timeout = options.idle_timeout;
    let mut last_inbound = Instant::now();

    loop {
        tokio::select! {
            command = control.recv() => match command {
                Some(TransportCommand::Subscribe { id, destination }) => {
                    tracing::debug!(%id, %destination, "subscribing");
                    let frame = Frame::subscribe(&id, &destination);
                    if let Err(err) = sink.send(StompItem::Frame(frame)).await {
                        return Outcome::Failed(err.to_string());
                    }
                }
                Some(TransportCommand::Send { destination, body }) => {
                    let frame = Frame::send_json(&destination, body);
                    if let Err(err) = sink.send(StompItem::Frame(frame)).await {
                        return Outcome::Failed(err.to_string());
                    }
                }
                Some(TransportCommand::Deactivate) | None => {
                    let _ = sink.send(StompItem::Frame(Frame::disconnect())).await;
                    let _ = sink.close().await;
                    return Outcome::Deactivated;
                }
            },
            item = stream.next() => {
                last_inbound = Instant::now();
                match item {
                    Some(Ok(StompItem::Heartbeat)) => {}
                    Some(Ok(StompItem::Frame(frame))) => match frame.command {
                        StompCommand::Message => {
                            let event = TransportEvent::Frame {
                                destination: frame.get_header("destination").unwrap_or_default().to_string(),
                                subscription: frame.get_header("subscription").map(str::to_string),
                                body: frame.body_text(),
                                received_at: chrono::Utc::now(),
                            };
                            if events.send(event).await.is_err() {
                                return Outcome::Deactivated;
                            }
                        }
                        StompCommand::Error => return Outcome::Rejected(error_message(&frame)),
                        other => tracing::debug!(command = %other, "ignoring frame"),
                    },
                    Some(Err(err)) => return Outcome::Failed(err.to_string()),
                    None => return Outcome::Failed("connection closed by gateway".to_string()),
                }
            }
            () = heartbeat_tick(&mut heartbeat) => {
                if let Err(err) = sink.send(StompItem::Heartbeat).await {
                    return Outcome::Failed(err.to_string());
                }
            }
            () = tokio::time::sleep_until(last_inbound + idle_timeout), if !idle_timeout.is_zero() => {
                return Outcome::Failed(format!("no traffic from gateway for {idle_timeout:?}"));
            }
        }
    }
}

async fn heartbeat_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Extracts the human-readable reason from an `ERROR` frame.
fn error_message(frame: &Frame) -> String {
    if let Some(message) = frame.get_header("message").filter(|m| !m.is_empty()) {
        return message.to_string();
    }
    let body = frame.body_text();
    let body = body.trim();
    if body.is_empty() {
        "gateway reported an error".to_string()
    } else {
        body.to_string()
    }
}
