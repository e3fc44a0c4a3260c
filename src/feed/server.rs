//! Feed Server
//!
//! Serves the simulated stats over websocket. A ticker task advances the
//! [`StatsFeed`] and publishes its frames on a broadcast channel; every
//! socket forwards what it receives from that channel.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use super::{FeedError, StatsFeed};
use crate::config::FeedConfig;

const BROADCAST_CAPACITY: usize = 64;

/// State shared by the routes and the ticker
pub struct FeedState {
    frames: broadcast::Sender<String>,
    clients: AtomicUsize,
    ticks_sent: AtomicU64,
    started_at: Instant,
}

impl FeedState {
    pub fn new() -> Self {
        let (frames, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            frames,
            clients: AtomicUsize::new(0),
            ticks_sent: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Push one tick's frames to every connected socket
    pub fn publish(&self, frames: Vec<String>) {
        for frame in frames {
            // no receivers just means nobody is watching
            let _ = self.frames.send(frame);
        }
        self.ticks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clients(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    pub fn ticks_sent(&self) -> u64 {
        self.ticks_sent.load(Ordering::Relaxed)
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct FeedHealth {
    pub status: String,
    pub clients: usize,
    pub ticks_sent: u64,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Demo stats feed
pub struct FeedServer {
    bind: String,
    interval: Duration,
    feed: StatsFeed,
    state: Arc<FeedState>,
}

impl FeedServer {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            bind: config.bind.clone(),
            interval: Duration::from_millis(config.interval_ms.max(1)),
            feed: StatsFeed::new(&config.hosts, config.max_ticks),
            state: Arc::new(FeedState::new()),
        }
    }

    pub fn state(&self) -> Arc<FeedState> {
        Arc::clone(&self.state)
    }

    pub fn router(&self) -> Router {
        build_router(self.state())
    }

    /// Bind, start ticking and serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<(), FeedError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind).await?;

        tracing::info!(
            addr = %listener.local_addr()?,
            interval_ms = self.interval.as_millis() as u64,
            "Stats feed listening"
        );

        let ticker = tokio::spawn(run_ticker(self.feed, Arc::clone(&self.state), self.interval));

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        ticker.abort();
        result?;

        tracing::info!("Stats feed shut down");
        Ok(())
    }
}

/// Routes for the feed
pub fn build_router(state: Arc<FeedState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run_ticker(mut feed: StatsFeed, state: Arc<FeedState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match feed.tick() {
            Ok(frames) => state.publish(frames),
            Err(e) => tracing::error!(error = %e, "Failed to build feed frames"),
        }
    }
}

async fn health(State(state): State<Arc<FeedState>>) -> Json<FeedHealth> {
    Json(FeedHealth {
        status: "ok".to_string(),
        clients: state.clients(),
        ticks_sent: state.ticks_sent(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<FeedState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<FeedState>) {
    let id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let mut frames = state.frames.subscribe();

    state.clients.fetch_add(1, Ordering::Relaxed);
    tracing::info!(client_id = %id, "Feed client connected");

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(client_id = %id, "Send failed, dropping client");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(client_id = %id, skipped, "Feed client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(client_id = %id, text = %text, "Ignoring client frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(client_id = %id, error = %e, "Feed client receive error");
                    break;
                }
            },
        }
    }

    state.clients.fetch_sub(1, Ordering::Relaxed);
    tracing::info!(client_id = %id, "Feed client disconnected");
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
