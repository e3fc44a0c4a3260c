//! Demo Stats Feed
//!
//! A stand-in for the balancer's UI push: simulated router hosts whose
//! stats are broadcast over `GET /ws` every interval, in the same message
//! shapes the dashboard store routes on.
//!
//! ```rust,no_run
//! use lbdash::config::FeedConfig;
//! use lbdash::feed::{shutdown_signal, FeedServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     FeedServer::new(&FeedConfig::default())
//!         .serve(shutdown_signal())
//!         .await?;
//!     Ok(())
//! }
//! ```

mod server;
mod stats;

pub use server::{build_router, shutdown_signal, FeedHealth, FeedServer, FeedState};
pub use stats::{GlobalStats, HostEntry, HostHistory, HostStats, StatsFeed};

use thiserror::Error;

/// Errors from the feed server
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
