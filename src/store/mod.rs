//! Dashboard State Store
//!
//! Projects connection events into a single reactive state container.
//!
//! ## Architecture
//!
//! - **StateStore**: owns the state, one mutation handler per event kind
//! - **TagRouter**: maps payloads to the domain slots they overwrite
//! - **Observers**: per-key subscriptions, notified only when their keys change
//!
//! ## State
//!
//! - `connection` - `is_connected` and the raw text of the last message
//! - `domain` - named slots (`hostList`, `stats` by default), last write wins

mod container;
mod dispatch;
mod observer;
mod state;

pub use container::{StateStore, StoreError};
pub use dispatch::{TagRouter, DEFAULT_MUTATION_FIELD};
pub use observer::Subscription;
pub use state::{
    ConnectionPhase, ConnectionState, DashboardState, DomainState, StateChange, StateKey,
};
