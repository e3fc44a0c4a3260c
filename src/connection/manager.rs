//! Connection Manager
//!
//! Owns the single websocket of a dashboard session. The socket lives in a
//! background task that splits the stream into a reader and a writer half,
//! pushes lifecycle and payload events onto the configured [`EventSink`], and
//! forwards outbound frames queued through a [`ConnectionHandle`].
//!
//! There is no reconnection: once the socket closes the task ends and the
//! session keeps running on whatever state it last saw.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::error::{ConnectionError, ConnectionResult};
use super::events::{ConnectionEvent, EventSink, Payload, PayloadFormat};

/// Options passed to [`ConnectionManager::connect`]
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How inbound frames are interpreted
    pub format: PayloadFormat,
    /// Where lifecycle and payload events are pushed
    pub sink: EventSink,
}

/// Frames queued for the writer half
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// Cloneable handle for sending on the session's socket
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Whether the socket is currently open
    pub fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Send a text frame
    pub fn send(&self, data: impl Into<String>) -> ConnectionResult<()> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }

        self.outbound
            .send(Outbound::Text(data.into()))
            .map_err(|_| ConnectionError::NotConnected)
    }

    /// Serialize a value and send it as a JSON text frame
    pub fn send_json<T: Serialize>(&self, value: &T) -> ConnectionResult<()> {
        let text = serde_json::to_string(value)?;
        self.send(text)
    }

    fn request_close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    /// A handle with no socket behind it
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (outbound, _) = mpsc::unbounded_channel();
        Self {
            outbound,
            open: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct ActiveConnection {
    url: String,
    handle: ConnectionHandle,
    task: JoinHandle<()>,
}

/// Maintains at most one live websocket connection
#[derive(Default)]
pub struct ConnectionManager {
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    /// Create a manager with no connection
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Establish the connection
    ///
    /// The handshake runs in the background; its outcome arrives on the sink
    /// as `Opened`, or as `Error` followed by `Closed`. Calling this again
    /// while the connection task is alive returns the existing handle for
    /// the same URL and fails for a different one.
    pub fn connect(&mut self, url: &str, options: ConnectOptions) -> ConnectionResult<ConnectionHandle> {
        if let Some(active) = &self.active {
            if !active.task.is_finished() {
                if active.url == url {
                    tracing::debug!(url = %url, "Connect called on active connection, ignoring");
                    return Ok(active.handle.clone());
                }
                return Err(ConnectionError::AlreadyConnected(active.url.clone()));
            }
        }

        let request = build_request(url)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        let handle = ConnectionHandle {
            outbound: outbound_tx,
            open: Arc::clone(&open),
        };

        tracing::info!(url = %url, format = ?options.format, "Connecting to dashboard socket");

        let task = tokio::spawn(run_connection(
            url.to_string(),
            request,
            options,
            outbound_rx,
            open,
        ));

        self.active = Some(ActiveConnection {
            url: url.to_string(),
            handle: handle.clone(),
            task,
        });

        Ok(handle)
    }

    /// Whether the socket is currently open
    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| a.handle.is_connected())
            .unwrap_or(false)
    }

    /// Send a text frame on the open socket
    pub fn send(&self, data: impl Into<String>) -> ConnectionResult<()> {
        match &self.active {
            Some(active) => active.handle.send(data),
            None => Err(ConnectionError::NotConnected),
        }
    }

    /// Serialize a value and send it as a JSON text frame
    pub fn send_json<T: Serialize>(&self, value: &T) -> ConnectionResult<()> {
        match &self.active {
            Some(active) => active.handle.send_json(value),
            None => Err(ConnectionError::NotConnected),
        }
    }

    /// Close the socket and wait for the connection task to finish
    pub async fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.request_close();
            if let Err(e) = active.task.await {
                tracing::warn!(url = %active.url, error = %e, "Connection task ended abnormally");
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.handle.request_close();
        }
    }
}

fn build_request(url: &str) -> ConnectionResult<Request> {
    let invalid = |reason: String| ConnectionError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        return Err(invalid("scheme must be ws or wss".to_string()));
    }

    url.into_client_request().map_err(|e| invalid(e.to_string()))
}

/// Resolves once a close is requested or every handle is gone
async fn close_requested(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    loop {
        match outbound.recv().await {
            Some(Outbound::Close) | None => return,
            Some(Outbound::Text(_)) => {
                tracing::warn!("Dropping frame queued before the socket opened");
            }
        }
    }
}

async fn run_connection(
    url: String,
    request: Request,
    options: ConnectOptions,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
) {
    let ConnectOptions { format, sink } = options;

    let connected = tokio::select! {
        result = connect_async(request) => result,
        _ = close_requested(&mut outbound) => {
            tracing::debug!(url = %url, "Close requested during handshake");
            sink.emit(ConnectionEvent::Closed);
            return;
        }
    };

    let ws_stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::error!(url = %url, error = %e, "WebSocket connection failed");
            sink.emit(ConnectionEvent::Error(e.to_string()));
            sink.emit(ConnectionEvent::Closed);
            return;
        }
    };

    open.store(true, Ordering::Release);
    tracing::info!(url = %url, "WebSocket connected");
    sink.emit(ConnectionEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    tracing::trace!(bytes = text.len(), "Received text frame");
                    sink.emit(ConnectionEvent::Message(Payload::from_text(text.as_str(), format)));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    tracing::trace!(bytes = bytes.len(), "Received binary frame");
                    sink.emit(ConnectionEvent::Message(Payload::from_binary(&bytes, format)));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(url = %url, frame = ?frame, "Server closed the socket");
                    break;
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(url = %url, error = %e, "WebSocket read error");
                    sink.emit(ConnectionEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::text(text)).await {
                        tracing::error!(url = %url, error = %e, "WebSocket send failed");
                        sink.emit(ConnectionEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    tracing::debug!(url = %url, "Closing socket");
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    open.store(false, Ordering::Release);

    let unsent = drain_unsent(&mut outbound);
    if unsent > 0 {
        tracing::warn!(url = %url, unsent, "Dropping frames queued after the socket closed");
    }

    tracing::info!(url = %url, "WebSocket closed");
    sink.emit(ConnectionEvent::Closed);
}

/// Close the queue and count the text frames that never reached the socket
fn drain_unsent(outbound: &mut mpsc::UnboundedReceiver<Outbound>) -> usize {
    outbound.close();

    let mut unsent = 0;
    while let Ok(frame) = outbound.try_recv() {
        if let Outbound::Text(_) = frame {
            unsent += 1;
        }
    }
    unsent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::events::EventReceiver;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_event(rx: &mut EventReceiver) -> ConnectionEvent {
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("sink closed")
    }

    /// Accepts one socket, sends the given frames, then echoes what it reads
    async fn spawn_server(frames: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(Message::text(frame)).await.unwrap();
            }
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
                if msg.is_text() {
                    let _ = ws.send(msg).await;
                }
            }
        });

        format!("ws://{}/ws", addr)
    }

    #[test]
    fn test_rejects_non_ws_url() {
        let result = build_request("http://localhost:8089/ws");
        assert!(matches!(result, Err(ConnectionError::InvalidUrl { .. })));
    }

    #[test]
    fn test_send_without_connection() {
        let manager = ConnectionManager::new();
        assert!(matches!(manager.send("hi"), Err(ConnectionError::NotConnected)));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_open_message_close_sequence() {
        let url = spawn_server(vec![r#"{"stats": {"cpu": 0.5}}"#.to_string()]).await;
        let (sink, mut rx) = EventSink::channel();
        let mut manager = ConnectionManager::new();

        manager
            .connect(&url, ConnectOptions { format: PayloadFormat::Json, sink })
            .unwrap();

        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Opened);
        match next_event(&mut rx).await {
            ConnectionEvent::Message(payload) => {
                assert_eq!(payload.raw, r#"{"stats": {"cpu": 0.5}}"#);
                assert!(payload.data.is_some());
            }
            other => panic!("Expected Message, got {:?}", other),
        }

        manager.close().await;
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Closed);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_send_echo() {
        let url = spawn_server(Vec::new()).await;
        let (sink, mut rx) = EventSink::channel();
        let mut manager = ConnectionManager::new();

        let handle = manager
            .connect(&url, ConnectOptions { format: PayloadFormat::Raw, sink })
            .unwrap();
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Opened);

        handle.send("ping").unwrap();
        match next_event(&mut rx).await {
            ConnectionEvent::Message(payload) => assert_eq!(payload.raw, "ping"),
            other => panic!("Expected Message, got {:?}", other),
        }

        manager.close().await;
        assert!(matches!(handle.send("late"), Err(ConnectionError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_for_same_url() {
        let url = spawn_server(Vec::new()).await;
        let (sink, mut rx) = EventSink::channel();
        let mut manager = ConnectionManager::new();

        let options = ConnectOptions { format: PayloadFormat::Json, sink };
        manager.connect(&url, options.clone()).unwrap();
        assert!(manager.connect(&url, options.clone()).is_ok());
        assert!(matches!(
            manager.connect("ws://127.0.0.1:1/other", options),
            Err(ConnectionError::AlreadyConnected(_))
        ));

        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Opened);
        manager.close().await;
    }

    #[tokio::test]
    async fn test_failed_handshake_emits_error_then_closed() {
        // Bind and drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (sink, mut rx) = EventSink::channel();
        let mut manager = ConnectionManager::new();
        manager
            .connect(&format!("ws://{}/ws", addr), ConnectOptions { format: PayloadFormat::Json, sink })
            .unwrap();

        assert!(matches!(next_event(&mut rx).await, ConnectionEvent::Error(_)));
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Closed);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_read_error_emits_error_then_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            // no close handshake
            drop(ws);
        });

        let (sink, mut rx) = EventSink::channel();
        let mut manager = ConnectionManager::new();
        manager
            .connect(&format!("ws://{}/ws", addr), ConnectOptions { format: PayloadFormat::Json, sink })
            .unwrap();

        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Opened);
        assert!(matches!(next_event(&mut rx).await, ConnectionEvent::Error(_)));
        assert_eq!(next_event(&mut rx).await, ConnectionEvent::Closed);

        assert!(!manager.is_connected());
        assert!(matches!(manager.send("late"), Err(ConnectionError::NotConnected)));
    }

    #[test]
    fn test_unsent_frames_are_counted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Outbound::Text("a".to_string())).unwrap();
        tx.send(Outbound::Close).unwrap();
        tx.send(Outbound::Text("b".to_string())).unwrap();

        assert_eq!(drain_unsent(&mut rx), 2);
        assert!(tx.send(Outbound::Text("c".to_string())).is_err());
    }
}
