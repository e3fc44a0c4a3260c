//! Dashboard Session
//!
//! A session is the lifetime of one dashboard: it builds the state store,
//! opens the socket, and runs the processing loop that applies connection
//! events to the store one at a time. The store never leaves the loop task;
//! everything else talks to it through a [`SessionHandle`].
//!
//! ```rust,no_run
//! use lbdash::config::Config;
//! use lbdash::session::Session;
//! use lbdash::store::StateKey;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let session = Session::start(&config.connection, &config.store)?;
//!
//!     let mut hosts = session.handle().subscribe([StateKey::slot("hostList")]).await?;
//!     while let Some(change) = hosts.next().await {
//!         println!("{:?}", change);
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{ConnectionConfig, StoreConfig};
use crate::connection::{
    ConnectOptions, ConnectionError, ConnectionHandle, ConnectionManager, EventReceiver,
    EventSink,
};
use crate::store::{DashboardState, StateKey, StateStore, StoreError, Subscription};

/// Errors returned by session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session is closed")]
    Closed,
}

/// Requests handled by the processing loop
enum Command {
    Subscribe {
        keys: Vec<StateKey>,
        reply: oneshot::Sender<Subscription>,
    },
    Snapshot {
        reply: oneshot::Sender<DashboardState>,
    },
    SetSlot {
        name: String,
        value: Value,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    Shutdown,
}

/// Cloneable access to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    connection: ConnectionHandle,
}

impl SessionHandle {
    /// Register interest in some state keys
    pub async fn subscribe<I>(&self, keys: I) -> Result<Subscription, SessionError>
    where
        I: IntoIterator<Item = StateKey>,
    {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Subscribe {
            keys: keys.into_iter().collect(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> Result<DashboardState, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Snapshot { reply })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Overwrite a domain slot from outside the socket
    pub async fn set_slot(&self, name: impl Into<String>, value: Value) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::SetSlot {
            name: name.into(),
            value,
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    /// Send a text frame on the session socket
    pub fn send(&self, data: impl Into<String>) -> Result<(), SessionError> {
        Ok(self.connection.send(data)?)
    }

    /// Send a JSON frame on the session socket
    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), SessionError> {
        Ok(self.connection.send_json(value)?)
    }

    /// Whether the socket is currently open
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn request(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

/// A running dashboard session
pub struct Session {
    handle: SessionHandle,
    connection: ConnectionManager,
    task: JoinHandle<StateStore>,
}

impl Session {
    /// Build the store, open the socket and start the processing loop
    pub fn start(connection: &ConnectionConfig, store: &StoreConfig) -> Result<Self, SessionError> {
        let store = StateStore::new(store);
        let (sink, events) = EventSink::channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let mut manager = ConnectionManager::new();
        let connection_handle = manager.connect(
            &connection.url,
            ConnectOptions {
                format: connection.format,
                sink,
            },
        )?;

        let task = tokio::spawn(run_loop(store, events, commands_rx));

        tracing::info!(url = %connection.url, "Dashboard session started");

        Ok(Self {
            handle: SessionHandle {
                commands: commands_tx,
                connection: connection_handle,
            },
            connection: manager,
            task,
        })
    }

    /// Handle for views and other collaborators
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Close the socket, apply the events still queued, stop the loop and
    /// return the final state
    pub async fn shutdown(mut self) -> DashboardState {
        self.connection.close().await;
        let _ = self.handle.commands.send(Command::Shutdown);

        match self.task.await {
            Ok(store) => {
                tracing::info!(revision = store.revision(), "Dashboard session stopped");
                store.snapshot()
            }
            Err(e) => {
                tracing::error!(error = %e, "Session loop ended abnormally");
                DashboardState::default()
            }
        }
    }
}

async fn run_loop(
    mut store: StateStore,
    mut events: EventReceiver,
    mut commands: mpsc::UnboundedReceiver<Command>,
) -> StateStore {
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;

            event = events.recv(), if events_open => match event {
                Some(event) => {
                    tracing::trace!(event = event.kind(), "Applying event");
                    store.apply(event);
                }
                None => {
                    tracing::debug!("Event stream ended");
                    events_open = false;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Subscribe { keys, reply }) => {
                    let _ = reply.send(store.subscribe(keys));
                }
                Some(Command::Snapshot { reply }) => {
                    let _ = reply.send(store.snapshot());
                }
                Some(Command::SetSlot { name, value, reply }) => {
                    let _ = reply.send(store.set_slot(&name, value));
                }
                Some(Command::Shutdown) | None => break,
            },
        }
    }

    while let Ok(event) = events.try_recv() {
        store.apply(event);
    }

    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionEvent, Payload, PayloadFormat};
    use crate::store::StateChange;
    use serde_json::json;

    /// Run the loop over a hand-fed event channel
    fn spawn_loop() -> (EventSink, mpsc::UnboundedSender<Command>, JoinHandle<StateStore>) {
        let (sink, events) = EventSink::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_loop(StateStore::new(&StoreConfig::default()), events, rx));
        (sink, tx, task)
    }

    #[tokio::test]
    async fn test_loop_applies_events_in_order() {
        let (sink, commands, task) = spawn_loop();

        sink.emit(ConnectionEvent::Opened);
        sink.emit(ConnectionEvent::Message(Payload::from_text(
            r#"{"hostList": {"name": "lb1"}}"#,
            PayloadFormat::Json,
        )));
        sink.emit(ConnectionEvent::Message(Payload::from_text(
            r#"{"hostList": {"name": "lb2"}}"#,
            PayloadFormat::Json,
        )));
        sink.emit(ConnectionEvent::Closed);
        drop(sink);

        commands.send(Command::Shutdown).unwrap();
        let store = task.await.unwrap();

        assert!(!store.connection().is_connected);
        assert_eq!(store.slot("hostList"), Some(&json!({"name": "lb2"})));
        assert_eq!(store.revision(), 4);
    }

    #[tokio::test]
    async fn test_handle_commands() {
        let (sink, commands, task) = spawn_loop();
        let handle = SessionHandle {
            commands: commands.clone(),
            connection: ConnectionHandle::detached(),
        };

        let mut sub = handle.subscribe([StateKey::slot("stats")]).await.unwrap();
        assert_eq!(
            sub.next().await,
            Some(StateChange::Slot { name: "stats".to_string(), value: json!({}) })
        );

        handle.set_slot("stats", json!({"cpu": 0.5})).await.unwrap();
        assert_eq!(
            sub.next().await,
            Some(StateChange::Slot { name: "stats".to_string(), value: json!({"cpu": 0.5}) })
        );

        assert!(matches!(
            handle.set_slot("missing", json!(1)).await,
            Err(SessionError::Store(StoreError::UnknownSlot(_)))
        ));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.domain.get("stats"), Some(&json!({"cpu": 0.5})));

        assert!(matches!(handle.send("hello"), Err(SessionError::Connection(_))));

        drop(sink);
        commands.send(Command::Shutdown).unwrap();
        task.await.unwrap();

        assert!(matches!(handle.snapshot().await, Err(SessionError::Closed)));
    }
}
