//! Service layer: session orchestration.
//!
//! [`ConnectionManager`] owns the gateway session, feeds decoded traffic
//! into the clock and known-signal state, and emits events through the
//! [`super::domain::EventBus`].

pub mod connection_manager;

pub use connection_manager::{ConnectionManager, DecodeFn, FeedSettings};
