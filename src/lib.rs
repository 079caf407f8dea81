//! # signalbox-feed
//!
//! Client for the live telemetry feed of a railway signalling simulation.
//!
//! The crate connects to the simulation's STOMP gateway, decodes the
//! loosely-typed JSON frames it publishes, tracks the simulated operating
//! clock and the signals seen on the wire, and republishes everything as
//! typed [`domain::FeedEvent`]s. A small HTTP and WebSocket surface exposes
//! the session to out-of-process consumers.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ConnectionManager (service/)
//!     ├── EventBus, ClockModel, KnownSignals (domain/)
//!     ├── MessageDecoder (decoder/)
//!     │
//!     ├── Transport trait, StompTransport (transport/)
//!     └── STOMP frames and codec (stomp/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod error;
pub mod service;
pub mod stomp;
pub mod transport;
pub mod ws;
