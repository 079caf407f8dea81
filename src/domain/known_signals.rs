//! Signal identifiers observed on the feed during one connection.
//!
//! The set only grows while a connection lives and is cleared on
//! disconnect. Its sole consumer is the bulk "all signals to danger"
//! command.

use std::collections::BTreeSet;

/// Ordered set of signal identifiers seen in `SG_MSG` traffic.
#[derive(Debug, Clone, Default)]
pub struct KnownSignals {
    ids: BTreeSet<String>,
}

impl KnownSignals {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a signal identifier. Returns `true` if it was not yet known.
    pub fn insert(&mut self, id: String) -> bool {
        self.ids.insert(id)
    }

    /// Returns `true` if the identifier has been seen.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Iterates identifiers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Returns the number of known identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no identifier is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forgets every identifier.
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
