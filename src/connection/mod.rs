//! Dashboard Socket Connection
//!
//! Owns the one websocket a dashboard session talks over.
//!
//! ## Architecture
//!
//! - **ConnectionManager**: starts the socket task, guards `send`, tears the socket down
//! - **Events**: lifecycle and payload events pushed to an [`EventSink`]
//! - **Errors**: failures reported to callers (`NotConnected`, bad URLs)
//!
//! The manager never interprets payloads. Everything it receives is handed
//! to the sink in the order the socket produced it.

mod error;
mod events;
mod manager;

pub use error::{ConnectionError, ConnectionResult};
pub use events::{ConnectionEvent, EventReceiver, EventSink, Payload, PayloadFormat};
pub use manager::{ConnectOptions, ConnectionHandle, ConnectionManager};
