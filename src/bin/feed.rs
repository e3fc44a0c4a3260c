//! lbdash-feed
//!
//! Serves simulated balancer stats for the dashboard to watch.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use lbdash::config::Config;
use lbdash::feed::{shutdown_signal, FeedServer};

#[derive(Parser)]
#[command(name = "lbdash-feed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Demo stats feed in the balancer's UI push format")]
struct Cli {
    /// Listen address, overrides the config
    #[arg(long)]
    bind: Option<String>,

    /// Tick interval in milliseconds, overrides the config
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default(),
    };

    if let Err(e) = lbdash::logging::init(&config.logging) {
        eprintln!("Logging disabled: {}", e);
    }

    if let Some(bind) = cli.bind {
        config.feed.bind = bind;
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.feed.interval_ms = interval_ms;
    }

    tracing::info!(
        hosts = config.feed.hosts.len(),
        max_ticks = config.feed.max_ticks,
        "lbdash-feed v{}",
        env!("CARGO_PKG_VERSION")
    );

    FeedServer::new(&config.feed)
        .serve(shutdown_signal())
        .await
        .context("feed server failed")?;

    Ok(())
}
