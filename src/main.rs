//! lbdash CLI
//!
//! Watches the balancer's live feed in the terminal.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use lbdash::config::{generate_default_config, Config};
use lbdash::connection::PayloadFormat;
use lbdash::session::{Session, SessionHandle};
use lbdash::store::{ConnectionState, StateChange, StateKey};
use lbdash::views::{run_view, Dashboard, View};

#[derive(Parser)]
#[command(name = "lbdash")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live dashboard for the cross-cluster load balancer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and render the dashboard on every change
    Watch {
        /// Websocket endpoint, overrides the config
        #[arg(long)]
        url: Option<String>,
        /// Print each raw frame instead of the dashboard
        #[arg(long)]
        raw: bool,
    },

    /// Print the default configuration
    Config {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { output } => write_default_config(output.as_deref()),
        Commands::Watch { url, raw } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Err(e) = lbdash::logging::init(&config.logging) {
                eprintln!("Logging disabled: {}", e);
            }

            if let Some(url) = url {
                config.connection.url = url;
            }
            if raw {
                config.connection.format = PayloadFormat::Raw;
            }

            watch(&config, raw).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(Config::load_default()),
    }
}

fn write_default_config(output: Option<&Path>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn watch(config: &Config, raw: bool) -> anyhow::Result<()> {
    let session = Session::start(&config.connection, &config.store)
        .context("starting dashboard session")?;
    let handle = session.handle();

    let render = async {
        if raw {
            print_frames(&handle).await
        } else {
            render_dashboard(&handle).await
        }
    };

    tokio::select! {
        result = render => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    let state = session.shutdown().await;
    tracing::info!(
        connected = state.connection.is_connected,
        slots = state.domain.names().count(),
        "Final state"
    );
    Ok(())
}

async fn render_dashboard(handle: &SessionHandle) -> anyhow::Result<()> {
    let dashboard = Dashboard::default();
    let subscription = handle.subscribe(dashboard.interests()).await?;

    run_view(dashboard, subscription, |view| {
        // clear screen, cursor home
        print!("\x1b[2J\x1b[H");
        println!("{}", view.render().join("\n"));
    })
    .await;
    Ok(())
}

async fn print_frames(handle: &SessionHandle) -> anyhow::Result<()> {
    let mut subscription = handle.subscribe([StateKey::Connection]).await?;
    let mut prev_connected = None;

    while let Some(change) = subscription.next().await {
        if let StateChange::Connection(state) = change {
            if let Some(frame) = frame_to_print(&mut prev_connected, &state) {
                println!("{}", frame);
            }
        }
    }
    Ok(())
}

/// Frame carried by a connection notification
///
/// Open and close notifications flip `is_connected` and carry no new frame.
/// The first notification is the current value and is skipped too.
fn frame_to_print<'a>(prev_connected: &mut Option<bool>, state: &'a ConnectionState) -> Option<&'a str> {
    let prev = prev_connected.replace(state.is_connected);
    if prev != Some(state.is_connected) {
        return None;
    }
    state.last_message.as_deref()
}
