//! State Store
//!
//! Single source of truth for dashboard state. Every connection event maps
//! to exactly one mutation handler, applied in delivery order. After a
//! mutation the store notifies the observers of the keys that changed.

use serde_json::Value;
use thiserror::Error;

use super::dispatch::TagRouter;
use super::observer::{ObserverRegistry, Subscription};
use super::state::{ConnectionState, DashboardState, DomainState, StateChange, StateKey};
use crate::config::StoreConfig;
use crate::connection::{ConnectionEvent, Payload};

/// Errors from direct store mutations
#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),
}

/// Reactive container for the dashboard's state
pub struct StateStore {
    state: DashboardState,
    router: TagRouter,
    observers: ObserverRegistry,
    revision: u64,
}

impl StateStore {
    /// Create a store with the configured slots at their defaults
    pub fn new(config: &StoreConfig) -> Self {
        let slots = config
            .slots
            .iter()
            .map(|slot| (slot.name.clone(), slot.default.clone()));
        let domain = DomainState::with_slots(slots);

        let router = TagRouter::new(
            config.slots.iter().map(|slot| slot.name.clone()),
            // An empty field name in TOML turns the mutation shape off
            config.mutation_field.clone().filter(|field| !field.is_empty()),
        );

        Self {
            state: DashboardState {
                connection: ConnectionState::default(),
                domain,
            },
            router,
            observers: ObserverRegistry::default(),
            revision: 0,
        }
    }

    /// Apply one connection event
    pub fn apply(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.on_open(),
            ConnectionEvent::Closed => self.on_close(),
            ConnectionEvent::Error(detail) => self.on_error(&detail),
            ConnectionEvent::Message(payload) => self.on_message(payload),
        }
    }

    fn on_open(&mut self) {
        self.set_connected(true);
    }

    fn on_close(&mut self) {
        self.set_connected(false);
    }

    fn set_connected(&mut self, connected: bool) {
        if self.state.connection.is_connected == connected {
            return;
        }

        self.state.connection.is_connected = connected;
        self.revision += 1;
        tracing::info!(connected, revision = self.revision, "Connection state changed");

        self.observers
            .notify(&StateChange::Connection(self.state.connection.clone()));
    }

    fn on_error(&mut self, detail: &str) {
        tracing::error!(
            error = %detail,
            connected = self.state.connection.is_connected,
            "Socket error"
        );
    }

    fn on_message(&mut self, payload: Payload) {
        let writes = payload
            .data
            .as_ref()
            .map(|data| self.router.route(data))
            .unwrap_or_default();

        self.state.connection.last_message = Some(payload.raw);
        self.revision += 1;
        self.observers
            .notify(&StateChange::Connection(self.state.connection.clone()));

        for (name, value) in writes {
            self.write_slot(&name, value);
        }
    }

    /// Overwrite a slot unconditionally
    pub fn set_slot(&mut self, name: &str, value: Value) -> Result<(), StoreError> {
        if !self.state.domain.contains(name) {
            return Err(StoreError::UnknownSlot(name.to_string()));
        }

        self.revision += 1;
        self.write_slot(name, value);
        Ok(())
    }

    fn write_slot(&mut self, name: &str, value: Value) {
        if !self.state.domain.replace(name, value.clone()) {
            return;
        }

        tracing::debug!(slot = %name, "Slot updated");
        self.observers.notify(&StateChange::Slot {
            name: name.to_string(),
            value,
        });
    }

    /// Register interest in some keys
    ///
    /// The subscription first yields the current value of every requested
    /// key, then one change per mutation that touches one of them.
    pub fn subscribe<I>(&mut self, keys: I) -> Subscription
    where
        I: IntoIterator<Item = StateKey>,
    {
        let keys: Vec<StateKey> = keys.into_iter().collect();
        let initial = keys.iter().filter_map(|key| self.current(key)).collect();
        self.observers.register(keys, initial)
    }

    fn current(&self, key: &StateKey) -> Option<StateChange> {
        match key {
            StateKey::Connection => Some(StateChange::Connection(self.state.connection.clone())),
            StateKey::Slot(name) => self.state.domain.get(name).map(|value| StateChange::Slot {
                name: name.clone(),
                value: value.clone(),
            }),
        }
    }

    /// Socket lifecycle fragment
    pub fn connection(&self) -> &ConnectionState {
        &self.state.connection
    }

    /// Current value of a slot
    pub fn slot(&self, name: &str) -> Option<&Value> {
        self.state.domain.get(name)
    }

    /// Registered slot names
    pub fn slot_names(&self) -> Vec<String> {
        self.state.domain.names().map(str::to_string).collect()
    }

    /// Copy of the full state
    pub fn snapshot(&self) -> DashboardState {
        self.state.clone()
    }

    /// Number of mutations applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of live observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
