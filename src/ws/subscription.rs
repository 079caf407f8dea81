//! Per-connection destination filter.
//!
//! Tracks which feed destinations a WebSocket client wants message events
//! from. Status and error events bypass the filter.

use std::collections::HashSet;

use crate::domain::FeedEvent;

/// Destination wildcard.
pub const ALL_DESTINATIONS: &str = "*";

/// Manages the destination subscriptions of a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed destinations. Ignored while `subscribe_all` is set.
    destinations: HashSet<String>,
    /// Whether the client subscribes to every destination.
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds destinations. `"*"` enables the wildcard.
    pub fn subscribe<S: AsRef<str>>(&mut self, destinations: &[S]) {
        for destination in destinations {
            match destination.as_ref() {
                ALL_DESTINATIONS => self.subscribe_all = true,
                name => {
                    self.destinations.insert(name.to_string());
                }
            }
        }
    }

    /// Removes destinations. `"*"` clears the wildcard.
    pub fn unsubscribe<S: AsRef<str>>(&mut self, destinations: &[S]) {
        for destination in destinations {
            match destination.as_ref() {
                ALL_DESTINATIONS => self.subscribe_all = false,
                name => {
                    self.destinations.remove(name);
                }
            }
        }
    }

    /// Returns `true` if `event` should be forwarded to the client.
    #[must_use]
    pub fn matches(&self, event: &FeedEvent) -> bool {
        match event.destination() {
            Some(destination) => self.subscribe_all || self.destinations.contains(destination),
            None => true,
        }
    }

    /// Returns the explicitly subscribed destinations, sorted.
    #[must_use]
    pub fn destinations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.destinations.iter().cloned().collect();
        names.sort();
        names
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub const fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
