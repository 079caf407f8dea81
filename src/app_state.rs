//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::ConnectionManager;
use crate::transport::SessionTarget;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection manager owning the gateway session.
    pub manager: Arc<ConnectionManager>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Target used when a connect request leaves fields out.
    pub default_target: SessionTarget,
}

impl AppState {
    /// Builds the state around `manager`, sharing its event bus.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, default_target: SessionTarget) -> Self {
        let event_bus = manager.event_bus().clone();
        Self {
            manager,
            event_bus,
            default_target,
        }
    }
}
