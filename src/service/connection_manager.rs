//! Connection manager: owns one feed session at a time.
//!
//! [`ConnectionManager`] activates a [`Transport`], follows its events on a
//! dedicated pump task and turns them into [`FeedEvent`]s on the
//! [`EventBus`]. It also owns the per-session state that message ingestion
//! mutates: the simulated clock and the set of known signals.
//!
//! Every session gets a fresh generation number. The pump checks it under
//! the state lock before applying any transport event, so a late event from
//! a torn-down session can never touch the state of its successor.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::decoder::decode_snapshot;
use crate::domain::{
    ClockModel, ClockState, ClockView, ConnectionStatus, DomainMessage, EventBus, FeedEvent,
    KnownSignals, OutboundCommand, StatusChange,
};
use crate::error::FeedError;
use crate::transport::{SessionTarget, Transport, TransportCommand, TransportEvent};

/// Body decoder attached to a subscription.
pub type DecodeFn = fn(&str) -> Vec<DomainMessage>;

/// Destinations a manager subscribes to and publishes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Destinations subscribed on every (re)connection, in order.
    pub destinations: Vec<String>,
    /// Destination outbound commands are sent to.
    pub command_destination: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            destinations: vec![
                "/topic/TD_ALL_SIG_AREA".to_string(),
                "/topic/TRAIN_MVT_ALL_TOC".to_string(),
                "/topic/SimSig".to_string(),
            ],
            command_destination: "/topic/SimSig".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    id: String,
    destination: String,
    decode: DecodeFn,
}

#[derive(Debug)]
struct SessionState {
    generation: u64,
    status: ConnectionStatus,
    ever_connected: bool,
    clock: ClockModel,
    clock_anchor: Instant,
    known_signals: KnownSignals,
    control: Option<mpsc::UnboundedSender<TransportCommand>>,
    subscriptions: Vec<Subscription>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            generation: 0,
            status: ConnectionStatus::Disconnected,
            ever_connected: false,
            clock: ClockModel::new(),
            clock_anchor: Instant::now(),
            known_signals: KnownSignals::new(),
            control: None,
            subscriptions: Vec::new(),
        }
    }

    /// Stops the transport, if any, and forgets everything tied to the
    /// session, the clock included.
    fn deactivate(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.send(TransportCommand::Deactivate);
        }
        self.subscriptions.clear();
        self.known_signals.clear();
        self.reset_clock();
        self.status = ConnectionStatus::Disconnected;
    }

    /// Moves a live session to `reconnecting` once its socket is gone.
    /// Returns `true` if the status changed.
    fn mark_lost(&mut self) -> bool {
        if !self.ever_connected || self.status != ConnectionStatus::Connected {
            return false;
        }
        self.status = ConnectionStatus::Reconnecting;
        true
    }

    fn reset_clock(&mut self) {
        self.clock.reset();
        self.clock_anchor = Instant::now();
    }

    fn decoder_for(&self, destination: &str, subscription: Option<&str>) -> DecodeFn {
        subscription
            .and_then(|id| self.subscriptions.iter().find(|s| s.id == id))
            .or_else(|| {
                self.subscriptions
                    .iter()
                    .find(|s| s.destination == destination)
            })
            .map_or(decode_snapshot as DecodeFn, |s| s.decode)
    }

    fn send_command(&self, destination: &str, body: String) -> bool {
        if self.status != ConnectionStatus::Connected {
            return false;
        }
        let Some(control) = &self.control else {
            return false;
        };
        control
            .send(TransportCommand::Send {
                destination: destination.to_string(),
                body,
            })
            .is_ok()
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: Uuid,
    stop: oneshot::Sender<()>,
    pump: JoinHandle<()>,
}

/// State shared between the manager and its pump task.
#[derive(Debug, Clone)]
struct Shared {
    state: Arc<RwLock<SessionState>>,
    event_bus: EventBus,
    settings: Arc<FeedSettings>,
}

/// Manages the lifecycle of one gateway session.
///
/// `connect` and `disconnect` are serialized through an async lifecycle
/// lock, so at most one transport session is ever active. Outcomes are
/// reported as status events on the bus rather than through return values.
#[derive(Debug)]
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    shared: Shared,
    lifecycle: Mutex<Option<ActiveSession>>,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, event_bus: EventBus, settings: FeedSettings) -> Self {
        Self {
            transport,
            shared: Shared {
                state: Arc::new(RwLock::new(SessionState::new())),
                event_bus,
                settings: Arc::new(settings),
            },
            lifecycle: Mutex::new(None),
        }
    }

    /// Returns the event bus the manager publishes on.
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        &self.shared.event_bus
    }

    /// Subscribes to the manager's events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.shared.event_bus.subscribe()
    }

    /// Returns the destination settings.
    #[must_use]
    pub fn settings(&self) -> &FeedSettings {
        &self.shared.settings
    }

    /// Starts a session against `target`.
    ///
    /// Any existing session is torn down first, and its pump task awaited,
    /// before the new one is activated. Returns once the transport has been
    /// activated; whether the gateway answers is reported on the bus.
    pub async fn connect(&self, target: SessionTarget) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.teardown(&mut lifecycle).await;

        let session = self.transport.activate(&target);
        let session_id = Uuid::new_v4();
        let generation = {
            let mut state = self.shared.state.write().await;
            state.generation = state.generation.wrapping_add(1);
            state.status = ConnectionStatus::Connecting;
            state.ever_connected = false;
            state.known_signals.clear();
            state.reset_clock();
            state.control = Some(session.control);
            state.subscriptions = self
                .shared
                .settings
                .destinations
                .iter()
                .enumerate()
                .map(|(index, destination)| Subscription {
                    id: format!("sub-{index}"),
                    destination: destination.clone(),
                    decode: decode_snapshot,
                })
                .collect();
            state.generation
        };

        tracing::info!(%target, %session_id, generation, "connecting to gateway");
        self.shared.event_bus.publish_status(StatusChange::Connecting);

        let (stop, stop_rx) = oneshot::channel();
        let pump = tokio::spawn(pump(
            self.shared.clone(),
            generation,
            session_id,
            session.events,
            stop_rx,
        ));
        *lifecycle = Some(ActiveSession {
            id: session_id,
            stop,
            pump,
        });
    }

    /// Ends the current session, if any.
    ///
    /// Deactivates the transport, cancels pending reconnects and clears the
    /// subscriptions and known signals. Safe to call repeatedly; a
    /// `disconnected` status is published only if the status changed.
    pub async fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.teardown(&mut lifecycle).await;
    }

    async fn teardown(&self, lifecycle: &mut Option<ActiveSession>) {
        let previous = {
            let mut state = self.shared.state.write().await;
            state.generation = state.generation.wrapping_add(1);
            let previous = state.status;
            state.deactivate();
            previous
        };

        if let Some(active) = lifecycle.take() {
            let _ = active.stop.send(());
            if let Err(err) = active.pump.await {
                tracing::warn!(session_id = %active.id, error = %err, "session pump ended abnormally");
            }
            tracing::debug!(session_id = %active.id, "session torn down");
        }

        if previous != ConnectionStatus::Disconnected {
            tracing::info!(status = "disconnected", "feed disconnected");
            self.shared.event_bus.publish_status(StatusChange::Disconnected);
        }
    }

    /// Serializes `payload` and sends it on the command destination.
    ///
    /// Does nothing unless the session is connected. Returns `true` if the
    /// command was handed to the transport; delivery is not acknowledged.
    pub async fn publish_command<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "command could not be serialized");
                return false;
            }
        };
        let state = self.shared.state.read().await;
        let sent = state.send_command(&self.shared.settings.command_destination, body);
        if !sent {
            tracing::debug!(status = state.status.as_str(), "command dropped");
        }
        sent
    }

    /// Sends a danger command for every signal seen on this session.
    ///
    /// Returns the number of identifiers known locally. Individual
    /// commands are not acknowledged.
    pub async fn all_signals_to_danger(&self) -> usize {
        let state = self.shared.state.read().await;
        let destination = &self.shared.settings.command_destination;
        let mut sent = 0usize;
        for signal in state.known_signals.iter() {
            let command = OutboundCommand::signal_to_danger(signal);
            let Ok(body) = serde_json::to_string(&command) else {
                continue;
            };
            if state.send_command(destination, body) {
                sent = sent.saturating_add(1);
            }
        }
        let known = state.known_signals.len();
        tracing::info!(known, sent, "all signals to danger");
        known
    }

    /// Current connection status.
    pub async fn status(&self) -> ConnectionStatus {
        self.shared.state.read().await.status
    }

    /// Copy of the current clock state.
    pub async fn clock_snapshot(&self) -> ClockState {
        self.shared.state.read().await.clock.snapshot()
    }

    /// Clock state anchored to the real instant of its last change.
    pub async fn clock_view(&self) -> ClockView {
        let state = self.shared.state.read().await;
        ClockView {
            state: state.clock.snapshot(),
            anchored_at: state.clock_anchor,
        }
    }

    /// Number of signals seen on the current session.
    pub async fn known_signal_count(&self) -> usize {
        self.shared.state.read().await.known_signals.len()
    }
}

async fn pump(
    shared: Shared,
    generation: u64,
    session_id: Uuid,
    mut events: mpsc::Receiver<TransportEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = &mut stop => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    shared.on_closed(generation).await;
                    break;
                }
            },
        };
        if shared.handle(generation, event).await.is_break() {
            break;
        }
    }
    tracing::debug!(%session_id, generation, "session pump stopped");
}

impl Shared {
    async fn handle(&self, generation: u64, event: TransportEvent) -> ControlFlow<()> {
        match event {
            TransportEvent::Connected { version } => self.on_connected(generation, version).await,
            TransportEvent::Reconnecting { attempt } => {
                self.on_reconnecting(generation, attempt).await
            }
            TransportEvent::ProtocolError { message } => {
                self.on_protocol_error(generation, &message).await
            }
            TransportEvent::Failed { reason } => {
                self.on_session_lost(generation, &FeedError::Transport(reason))
                    .await
            }
            TransportEvent::Frame {
                destination,
                subscription,
                body,
                received_at,
            } => {
                self.on_frame(generation, destination, subscription.as_deref(), &body, received_at)
                    .await
            }
        }
    }

    async fn on_connected(&self, generation: u64, version: Option<String>) -> ControlFlow<()> {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return ControlFlow::Break(());
        }
        state.status = ConnectionStatus::Connected;
        state.ever_connected = true;
        if let Some(control) = &state.control {
            for subscription in &state.subscriptions {
                let _ = control.send(TransportCommand::Subscribe {
                    id: subscription.id.clone(),
                    destination: subscription.destination.clone(),
                });
            }
        }
        drop(state);

        tracing::info!(generation, version = version.as_deref().unwrap_or("1.0"), status = "connected", "feed connected");
        self.event_bus.publish_status(StatusChange::Connected);
        ControlFlow::Continue(())
    }

    async fn on_reconnecting(&self, generation: u64, attempt: u32) -> ControlFlow<()> {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return ControlFlow::Break(());
        }
        if !state.ever_connected {
            state.deactivate();
            drop(state);
            tracing::warn!(generation, "gateway never answered; giving up");
            self.event_bus.publish_status(StatusChange::NoGateway);
            return ControlFlow::Break(());
        }
        if state.status == ConnectionStatus::Reconnecting {
            tracing::debug!(generation, attempt, "reconnect attempt");
            return ControlFlow::Continue(());
        }
        state.status = ConnectionStatus::Reconnecting;
        drop(state);

        tracing::info!(generation, attempt, status = "reconnecting", "feed reconnecting");
        self.event_bus.publish_status(StatusChange::Reconnecting);
        ControlFlow::Continue(())
    }

    /// A transport failure or a non-fatal gateway error. Either way the
    /// socket is gone and the transport is already retrying.
    async fn on_session_lost(&self, generation: u64, err: &FeedError) -> ControlFlow<()> {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return ControlFlow::Break(());
        }
        let lost = state.mark_lost();
        drop(state);

        self.event_bus.publish_error(err);
        if lost {
            tracing::info!(generation, error = %err, status = "reconnecting", "feed session lost");
            self.event_bus.publish_status(StatusChange::Reconnecting);
        }
        ControlFlow::Continue(())
    }

    /// The transport's event stream ended without being asked to stop.
    async fn on_closed(&self, generation: u64) {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return;
        }
        state.deactivate();
        drop(state);

        let err = FeedError::Transport("transport stopped unexpectedly".to_string());
        tracing::error!(generation, error = %err, "feed transport ended");
        self.event_bus.publish_error(&err);
        self.event_bus.publish_status(StatusChange::Disconnected);
    }

    async fn on_protocol_error(&self, generation: u64, message: &str) -> ControlFlow<()> {
        let err = FeedError::classify_protocol(message);
        if !err.is_fatal() {
            return self.on_session_lost(generation, &err).await;
        }
        let mut state = self.state.write().await;
        if state.generation != generation {
            return ControlFlow::Break(());
        }
        state.deactivate();
        drop(state);

        tracing::warn!(generation, error = %err, "stopping after credential rejection");
        self.event_bus.publish_error(&err);
        self.event_bus.publish_status(StatusChange::Disconnected);
        ControlFlow::Break(())
    }

    /// Decodes a frame, applies it to the session state, then dispatches
    /// every decoded message in order.
    async fn on_frame(
        &self,
        generation: u64,
        destination: String,
        subscription: Option<&str>,
        body: &str,
        received_at: DateTime<Utc>,
    ) -> ControlFlow<()> {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return ControlFlow::Break(());
        }
        let messages = state.decoder_for(&destination, subscription)(body);

        let mut clock_changed = false;
        for message in &messages {
            if let Some(signal) = message.signal_id() {
                state.known_signals.insert(signal);
            }
            if let Some(tick) = message.clock_tick() {
                clock_changed |= state.clock.apply_tick(&tick);
            } else if let Some(time) = message.time_field() {
                clock_changed |= state.clock.apply_opportunistic_time(time);
            }
        }
        if clock_changed {
            state.clock_anchor = Instant::now();
        }
        drop(state);

        for message in messages {
            if message.is_unrecognized() {
                tracing::debug!(%destination, kind = message.kind_str(), "unrecognized message");
            }
            self.event_bus.publish(FeedEvent::Message {
                destination: destination.clone(),
                message,
                received_at,
            });
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::transport::TransportSession;

    /// Transport whose sessions are driven by the test.
    #[derive(Debug, Default)]
    struct MockTransport {
        sessions: std::sync::Mutex<VecDeque<MockSession>>,
    }

    #[derive(Debug)]
    struct MockSession {
        target: SessionTarget,
        events: mpsc::Sender<TransportEvent>,
        control: mpsc::UnboundedReceiver<TransportCommand>,
    }

    impl MockTransport {
        fn take_session(&self) -> MockSession {
            let Ok(mut sessions) = self.sessions.lock() else {
                panic!("mock lock poisoned");
            };
            let Some(session) = sessions.pop_front() else {
                panic!("no session was activated");
            };
            session
        }
    }

    impl Transport for MockTransport {
        fn activate(&self, target: &SessionTarget) -> TransportSession {
            let (event_tx, events) = mpsc::channel(64);
            let (control, control_rx) = mpsc::unbounded_channel();
            if let Ok(mut sessions) = self.sessions.lock() {
                sessions.push_back(MockSession {
                    target: target.clone(),
                    events: event_tx,
                    control: control_rx,
                });
            }
            TransportSession { events, control }
        }
    }

    impl MockSession {
        async fn emit(&self, event: TransportEvent) {
            if self.events.send(event).await.is_err() {
                panic!("pump is gone");
            }
        }

        async fn frame(&self, destination: &str, body: &str) {
            self.emit(TransportEvent::Frame {
                destination: destination.to_string(),
                subscription: None,
                body: body.to_string(),
                received_at: Utc::now(),
            })
            .await;
        }

        async fn next_command(&mut self) -> TransportCommand {
            let Ok(Some(command)) =
                tokio::time::timeout(Duration::from_secs(2), self.control.recv()).await
            else {
                panic!("expected a transport command");
            };
            command
        }
    }

    fn setup() -> (Arc<MockTransport>, ConnectionManager, broadcast::Receiver<FeedEvent>) {
        let transport = Arc::new(MockTransport::default());
        let manager = ConnectionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            EventBus::new(256),
            FeedSettings::default(),
        );
        let rx = manager.subscribe_events();
        (transport, manager, rx)
    }

    async fn next_event(rx: &mut broadcast::Receiver<FeedEvent>) -> FeedEvent {
        let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await else {
            panic!("expected an event");
        };
        event
    }

    async fn next_status(rx: &mut broadcast::Receiver<FeedEvent>) -> StatusChange {
        let FeedEvent::Status { status, .. } = next_event(rx).await else {
            panic!("expected a status event");
        };
        status
    }

    async fn assert_quiet(rx: &mut broadcast::Receiver<FeedEvent>) {
        let outcome = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(outcome.is_err(), "unexpected event: {outcome:?}");
    }

    async fn connected_session(
        transport: &MockTransport,
        manager: &ConnectionManager,
        rx: &mut broadcast::Receiver<FeedEvent>,
    ) -> MockSession {
        manager.connect(SessionTarget::new("gw", 51515)).await;
        let mut session = transport.take_session();
        session.emit(TransportEvent::Connected { version: None }).await;
        assert_eq!(next_status(rx).await, StatusChange::Connecting);
        assert_eq!(next_status(rx).await, StatusChange::Connected);
        for _ in 0..manager.settings().destinations.len() {
            let TransportCommand::Subscribe { .. } = session.next_command().await else {
                panic!("expected a subscription");
            };
        }
        session
    }

    #[tokio::test]
    async fn connected_session_subscribes_every_destination() {
        let (transport, manager, mut rx) = setup();
        manager
            .connect(SessionTarget::new("gw", 51515).with_credentials("user", "pw"))
            .await;
        assert_eq!(manager.status().await, ConnectionStatus::Connecting);

        let mut session = transport.take_session();
        assert_eq!(session.target.port, 51515);
        session.emit(TransportEvent::Connected { version: Some("1.2".into()) }).await;

        assert_eq!(next_status(&mut rx).await, StatusChange::Connecting);
        assert_eq!(next_status(&mut rx).await, StatusChange::Connected);
        assert_eq!(manager.status().await, ConnectionStatus::Connected);

        for (index, expected) in FeedSettings::default().destinations.iter().enumerate() {
            let TransportCommand::Subscribe { id, destination } = session.next_command().await
            else {
                panic!("expected a subscription");
            };
            assert_eq!(id, format!("sub-{index}"));
            assert_eq!(&destination, expected);
        }
    }

    #[tokio::test]
    async fn unreachable_gateway_reports_no_gateway_once() {
        let (transport, manager, mut rx) = setup();
        manager.connect(SessionTarget::new("nowhere", 1)).await;
        let mut session = transport.take_session();

        session.emit(TransportEvent::Failed { reason: "refused".into() }).await;
        session.emit(TransportEvent::Reconnecting { attempt: 1 }).await;

        assert_eq!(next_status(&mut rx).await, StatusChange::Connecting);
        let FeedEvent::Error { kind, .. } = next_event(&mut rx).await else {
            panic!("expected a transport error");
        };
        assert_eq!(kind, "transport");
        assert_eq!(next_status(&mut rx).await, StatusChange::NoGateway);
        assert_eq!(session.next_command().await, TransportCommand::Deactivate);
        assert_eq!(manager.status().await, ConnectionStatus::Disconnected);

        let _ = session
            .events
            .send(TransportEvent::Reconnecting { attempt: 2 })
            .await;
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn mid_session_drop_reconnects_and_resumes_dispatch() {
        let (transport, manager, mut rx) = setup();
        let mut session = connected_session(&transport, &manager, &mut rx).await;

        session.emit(TransportEvent::Failed { reason: "reset".into() }).await;
        session.emit(TransportEvent::Reconnecting { attempt: 1 }).await;
        session.emit(TransportEvent::Connected { version: None }).await;

        let FeedEvent::Error { .. } = next_event(&mut rx).await else {
            panic!("expected a transport error");
        };
        assert_eq!(next_status(&mut rx).await, StatusChange::Reconnecting);
        assert_eq!(next_status(&mut rx).await, StatusChange::Connected);

        // Subscriptions are re-issued on the new session.
        let TransportCommand::Subscribe { .. } = session.next_command().await else {
            panic!("expected a subscription");
        };

        session
            .frame("/topic/TD_ALL_SIG_AREA", r#"{"CA_MSG":{"descr":"1A40","from":"0101","to":"0103"}}"#)
            .await;
        let FeedEvent::Message { destination, message, .. } = next_event(&mut rx).await else {
            panic!("expected a message");
        };
        assert_eq!(destination, "/topic/TD_ALL_SIG_AREA");
        assert_eq!(message.kind_str(), "step");
    }

    #[tokio::test]
    async fn danger_command_per_known_signal() {
        let (transport, manager, mut rx) = setup();
        let mut session = connected_session(&transport, &manager, &mut rx).await;

        for id in ["S5", "S3", "S1", "S4", "S2", "S3"] {
            let body = format!(r#"{{"SG_MSG":{{"obj_type":"signal","obj_id":"{id}","new_state":"0"}}}}"#);
            session.frame("/topic/TD_ALL_SIG_AREA", &body).await;
        }
        session
            .frame(
                "/topic/TD_ALL_SIG_AREA",
                r#"{"SG_MSG":{"obj_type":"route","obj_id":"R1","new_state":"1"}}"#,
            )
            .await;
        for _ in 0..7 {
            let FeedEvent::Message { .. } = next_event(&mut rx).await else {
                panic!("expected a message");
            };
        }

        assert_eq!(manager.all_signals_to_danger().await, 5);

        for expected in ["S1", "S2", "S3", "S4", "S5"] {
            let TransportCommand::Send { destination, body } = session.next_command().await else {
                panic!("expected a command");
            };
            assert_eq!(destination, "/topic/SimSig");
            assert_eq!(body, format!(r#"{{"bpull":{{"signal":"{expected}"}}}}"#));
        }
        assert!(session.control.try_recv().is_err());
    }

    #[tokio::test]
    async fn credential_rejection_is_terminal() {
        let (transport, manager, mut rx) = setup();
        let mut session = connected_session(&transport, &manager, &mut rx).await;

        session
            .frame(
                "/topic/SimSig",
                r#"{"clock_msg":{"area_id":"ARE","clock":"5000","interval":"500","paused":"False"}}"#,
            )
            .await;
        let FeedEvent::Message { .. } = next_event(&mut rx).await else {
            panic!("expected a message");
        };
        assert_eq!(manager.clock_snapshot().await.simulated_seconds, 5000);

        session
            .emit(TransportEvent::ProtocolError {
                message: "Invalid login or passcode".into(),
            })
            .await;

        let FeedEvent::Error { kind, .. } = next_event(&mut rx).await else {
            panic!("expected an auth error");
        };
        assert_eq!(kind, "auth");
        assert_eq!(next_status(&mut rx).await, StatusChange::Disconnected);
        assert_eq!(session.next_command().await, TransportCommand::Deactivate);
        assert_eq!(manager.status().await, ConnectionStatus::Disconnected);
        assert_eq!(manager.clock_snapshot().await.simulated_seconds, 0);
    }

    #[tokio::test]
    async fn other_protocol_errors_start_reconnecting() {
        let (transport, manager, mut rx) = setup();
        let mut session = connected_session(&transport, &manager, &mut rx).await;

        session
            .emit(TransportEvent::ProtocolError {
                message: "destination not found".into(),
            })
            .await;

        let FeedEvent::Error { kind, .. } = next_event(&mut rx).await else {
            panic!("expected an error");
        };
        assert_eq!(kind, "transport");
        assert_eq!(next_status(&mut rx).await, StatusChange::Reconnecting);
        assert_eq!(manager.status().await, ConnectionStatus::Reconnecting);

        // The transport's own retry notice does not repeat the status.
        session.emit(TransportEvent::Reconnecting { attempt: 1 }).await;
        session.emit(TransportEvent::Connected { version: None }).await;
        assert_eq!(next_status(&mut rx).await, StatusChange::Connected);
        let TransportCommand::Subscribe { .. } = session.next_command().await else {
            panic!("expected a subscription");
        };
    }

    #[tokio::test]
    async fn lost_session_refuses_commands_until_reconnected() {
        let (transport, manager, mut rx) = setup();
        let mut session = connected_session(&transport, &manager, &mut rx).await;
        let command = OutboundCommand::signal_to_danger("S7");

        session.emit(TransportEvent::Failed { reason: "reset".into() }).await;
        let FeedEvent::Error { .. } = next_event(&mut rx).await else {
            panic!("expected a transport error");
        };
        assert_eq!(next_status(&mut rx).await, StatusChange::Reconnecting);
        assert!(!manager.publish_command(&command).await);
        assert!(session.control.try_recv().is_err());

        session.emit(TransportEvent::Connected { version: None }).await;
        assert_eq!(next_status(&mut rx).await, StatusChange::Connected);
        for _ in 0..manager.settings().destinations.len() {
            let TransportCommand::Subscribe { .. } = session.next_command().await else {
                panic!("expected a subscription");
            };
        }
        assert!(manager.publish_command(&command).await);
    }

    #[tokio::test]
    async fn closed_event_stream_disconnects() {
        let (transport, manager, mut rx) = setup();
        let session = connected_session(&transport, &manager, &mut rx).await;
        let MockSession {
            events,
            mut control,
            ..
        } = session;
        drop(events);

        let FeedEvent::Error { kind, .. } = next_event(&mut rx).await else {
            panic!("expected a transport error");
        };
        assert_eq!(kind, "transport");
        assert_eq!(next_status(&mut rx).await, StatusChange::Disconnected);
        assert_eq!(manager.status().await, ConnectionStatus::Disconnected);
        assert_eq!(control.recv().await, Some(TransportCommand::Deactivate));

        manager.disconnect().await;
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (transport, manager, mut rx) = setup();
        manager.disconnect().await;
        assert_quiet(&mut rx).await;

        let mut session = connected_session(&transport, &manager, &mut rx).await;
        manager.disconnect().await;
        assert_eq!(next_status(&mut rx).await, StatusChange::Disconnected);
        assert_eq!(session.next_command().await, TransportCommand::Deactivate);
        assert_eq!(manager.known_signal_count().await, 0);

        manager.disconnect().await;
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn reconnect_replaces_the_previous_session() {
        let (transport, manager, mut rx) = setup();
        manager.connect(SessionTarget::new("gw", 1)).await;
        let mut first = transport.take_session();
        manager.connect(SessionTarget::new("gw", 2)).await;
        let second = transport.take_session();

        assert_eq!(first.next_command().await, TransportCommand::Deactivate);
        let _ = first
            .events
            .send(TransportEvent::Connected { version: None })
            .await;

        assert_eq!(next_status(&mut rx).await, StatusChange::Connecting);
        assert_eq!(next_status(&mut rx).await, StatusChange::Disconnected);
        assert_eq!(next_status(&mut rx).await, StatusChange::Connecting);
        assert_quiet(&mut rx).await;
        assert_eq!(manager.status().await, ConnectionStatus::Connecting);

        second.emit(TransportEvent::Connected { version: None }).await;
        assert_eq!(next_status(&mut rx).await, StatusChange::Connected);
    }

    #[tokio::test]
    async fn clock_is_updated_before_dispatch() {
        let (transport, manager, mut rx) = setup();
        let session = connected_session(&transport, &manager, &mut rx).await;

        session
            .frame(
                "/topic/SimSig",
                r#"{"clock_msg":{"area_id":"ARE","clock":"100","interval":"250","paused":"False"}}{"train_location":{"headcode":"1A40","location":"ARE","time":"200"}}"#,
            )
            .await;

        let FeedEvent::Message { message, .. } = next_event(&mut rx).await else {
            panic!("expected a message");
        };
        assert_eq!(message.kind_str(), "clock_tick");
        // The whole batch was applied before the first dispatch.
        let state = manager.clock_snapshot().await;
        assert_eq!(state.simulated_seconds, 200);
        assert_eq!(state.tick_interval_ms, 250);
        assert_eq!(state.area_id, "ARE");

        let FeedEvent::Message { message, .. } = next_event(&mut rx).await else {
            panic!("expected a message");
        };
        assert_eq!(message.train_id().as_deref(), Some("1A40"));
        assert!((manager.clock_view().await.speed_ratio() - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn malformed_fragment_is_dispatched_as_parse_error() {
        let (transport, manager, mut rx) = setup();
        let session = connected_session(&transport, &manager, &mut rx).await;

        session
            .frame("/topic/TD_ALL_SIG_AREA", r#"{"CB_MSG":{"descr":"2B11","from":"0201"}}{broken"#)
            .await;

        let FeedEvent::Message { message: first, .. } = next_event(&mut rx).await else {
            panic!("expected a message");
        };
        let FeedEvent::Message { message: second, .. } = next_event(&mut rx).await else {
            panic!("expected a message");
        };
        assert_eq!(first.kind_str(), "cancel");
        assert!(matches!(second, DomainMessage::ParseError { .. }));
        assert_eq!(manager.status().await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn commands_require_a_connected_session() {
        let (transport, manager, mut rx) = setup();
        let command = OutboundCommand::signal_to_danger("S9");
        assert!(!manager.publish_command(&command).await);

        let mut session = connected_session(&transport, &manager, &mut rx).await;
        assert!(manager.publish_command(&command).await);
        let TransportCommand::Send { body, .. } = session.next_command().await else {
            panic!("expected a command");
        };
        assert_eq!(body, r#"{"bpull":{"signal":"S9"}}"#);
    }
}
