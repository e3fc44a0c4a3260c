//! # lbdash
//!
//! Live dashboard client for the cross-cluster load balancer. One websocket
//! session per dashboard feeds a reactive state store; views subscribe to
//! the parts of the state they render.
//!
//! ## Modules
//!
//! - [`connection`]: websocket lifecycle and outbound sends
//! - [`store`]: state container, tag routing and observers
//! - [`session`]: processing loop that owns the store
//! - [`views`]: navbar, stats and host list renderers
//! - [`feed`]: demo server speaking the balancer's UI push format
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lbdash::config::Config;
//! use lbdash::session::Session;
//! use lbdash::views::{run_view, Dashboard, View};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let session = Session::start(&config.connection, &config.store)?;
//!
//!     let dashboard = Dashboard::default();
//!     let subscription = session.handle().subscribe(dashboard.interests()).await?;
//!     run_view(dashboard, subscription, |view| {
//!         println!("{}", view.render().join("\n"));
//!     })
//!     .await;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod feed;
pub mod logging;
pub mod session;
pub mod store;
pub mod views;

pub use config::{Config, ConfigError};
pub use connection::{ConnectionError, ConnectionEvent, ConnectionManager, Payload, PayloadFormat};
pub use feed::{FeedError, FeedServer, StatsFeed};
pub use session::{Session, SessionError, SessionHandle};
pub use store::{DashboardState, StateChange, StateKey, StateStore, StoreError, Subscription};
pub use views::{run_view, Dashboard, View};
