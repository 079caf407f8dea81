//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams feed events to consumers and
//! accepts destination subscription commands.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
