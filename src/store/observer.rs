//! Observer Registry
//!
//! Views register interest in a set of [`StateKey`]s and get a
//! [`Subscription`]. After each mutation the store notifies only the
//! observers whose key set contains the changed key.

use std::collections::HashSet;
use tokio::sync::mpsc;

use super::state::{StateChange, StateKey};

/// Stream of changes for the keys an observer asked for
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<StateChange>,
}

impl Subscription {
    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<StateChange> {
        self.rx.recv().await
    }

    /// Take a pending change without waiting
    pub fn try_next(&mut self) -> Option<StateChange> {
        self.rx.try_recv().ok()
    }

    /// Take every pending change without waiting
    pub fn drain(&mut self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        while let Ok(change) = self.rx.try_recv() {
            changes.push(change);
        }
        changes
    }
}

struct Observer {
    keys: HashSet<StateKey>,
    tx: mpsc::UnboundedSender<StateChange>,
}

/// Interested-observer bookkeeping used by the store
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Vec<Observer>,
}

impl ObserverRegistry {
    /// Register interest. `initial` is delivered before any later change.
    pub fn register<I>(&mut self, keys: I, initial: Vec<StateChange>) -> Subscription
    where
        I: IntoIterator<Item = StateKey>,
    {
        let keys: HashSet<StateKey> = keys.into_iter().collect();
        let (tx, rx) = mpsc::unbounded_channel();

        for change in initial {
            let _ = tx.send(change);
        }

        tracing::debug!(keys = ?keys, observers = self.observers.len() + 1, "Observer registered");
        self.observers.push(Observer { keys, tx });

        Subscription { rx }
    }

    /// Deliver a change to every observer interested in its key
    pub fn notify(&mut self, change: &StateChange) -> usize {
        let key = change.key();
        let mut delivered = 0;

        self.observers.retain(|observer| {
            if observer.tx.is_closed() {
                return false;
            }
            if observer.keys.contains(&key) && observer.tx.send(change.clone()).is_ok() {
                delivered += 1;
            }
            true
        });

        tracing::trace!(key = %key, observers = delivered, "Notified observers");
        delivered
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::state::ConnectionState;
    use serde_json::json;

    #[test]
    fn test_only_interested_observers_notified() {
        let mut registry = ObserverRegistry::default();
        let mut conn_sub = registry.register([StateKey::Connection], Vec::new());
        let mut stats_sub = registry.register([StateKey::slot("stats")], Vec::new());

        let delivered = registry.notify(&StateChange::Slot {
            name: "stats".to_string(),
            value: json!({"cpu": 0.5}),
        });

        assert_eq!(delivered, 1);
        assert!(conn_sub.try_next().is_none());
        assert!(stats_sub.try_next().is_some());
    }

    #[test]
    fn test_initial_changes_come_first() {
        let mut registry = ObserverRegistry::default();
        let mut sub = registry.register(
            [StateKey::Connection],
            vec![StateChange::Connection(ConnectionState::default())],
        );

        registry.notify(&StateChange::Connection(ConnectionState {
            is_connected: true,
            last_message: None,
        }));

        let changes = sub.drain();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], StateChange::Connection(ConnectionState::default()));
    }

    #[test]
    fn test_dropped_subscriptions_are_pruned() {
        let mut registry = ObserverRegistry::default();
        let sub = registry.register([StateKey::Connection], Vec::new());
        let _keep = registry.register([StateKey::Connection], Vec::new());
        assert_eq!(registry.len(), 2);

        drop(sub);
        registry.notify(&StateChange::Connection(ConnectionState::default()));
        assert_eq!(registry.len(), 1);
    }
}
