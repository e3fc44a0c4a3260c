//! State Types
//!
//! The fragments of dashboard state owned by the store and the change
//! notifications handed to observers.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Socket lifecycle as seen by the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    /// True iff the socket is currently open
    pub is_connected: bool,
    /// Raw text of the most recent message
    pub last_message: Option<String>,
}

/// Connection lifecycle phase tracked by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connected,
}

impl ConnectionState {
    /// Current lifecycle phase
    pub fn phase(&self) -> ConnectionPhase {
        if self.is_connected {
            ConnectionPhase::Connected
        } else {
            ConnectionPhase::Disconnected
        }
    }
}

/// Named slots holding the latest payload for each data category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainState {
    slots: BTreeMap<String, Value>,
}

impl DomainState {
    /// Create slots with their initial placeholder values
    pub fn with_slots<I>(slots: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    /// Current value of a slot
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Whether a slot with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Slot names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Replace a slot's value. Returns false if the slot is not registered.
    pub(crate) fn replace(&mut self, name: &str, value: Value) -> bool {
        match self.slots.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// Full read-only snapshot of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardState {
    pub connection: ConnectionState,
    pub domain: DomainState,
}

/// A piece of state an observer can depend on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    /// The socket lifecycle fragment
    Connection,
    /// A domain slot, by name
    Slot(String),
}

impl StateKey {
    /// Key for a named slot
    pub fn slot(name: impl Into<String>) -> Self {
        StateKey::Slot(name.into())
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::Connection => write!(f, "connection"),
            StateKey::Slot(name) => write!(f, "slot:{}", name),
        }
    }
}

/// Notification delivered to interested observers
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Connection(ConnectionState),
    Slot { name: String, value: Value },
}

impl StateChange {
    /// The key this change belongs to
    pub fn key(&self) -> StateKey {
        match self {
            StateChange::Connection(_) => StateKey::Connection,
            StateChange::Slot { name, .. } => StateKey::Slot(name.clone()),
        }
    }
}
