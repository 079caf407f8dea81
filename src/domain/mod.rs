//! Domain layer: decoded messages, clock model, and event system.
//!
//! This module contains the feed's domain model: the typed messages the
//! decoder produces, the simulated clock they update, the set of signals
//! seen on the wire, outbound commands, and the event bus through which
//! consumers observe all of it.

pub mod clock;
pub mod command;
pub mod event_bus;
pub mod feed_event;
pub mod known_signals;
pub mod message;

pub use clock::{ClockModel, ClockState, ClockTick, ClockView, format_as_clock};
pub use command::OutboundCommand;
pub use event_bus::EventBus;
pub use feed_event::{ConnectionStatus, FeedEvent, StatusChange};
pub use known_signals::KnownSignals;
pub use message::DomainMessage;
