//! Connection Events
//!
//! Event types emitted by the connection manager and the payload wrapper
//! that carries inbound frames to the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// How inbound frames are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Parse each frame as JSON; frames that fail to parse stay opaque
    #[default]
    Json,
    /// Deliver frames as raw text only
    Raw,
}

impl std::str::FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(PayloadFormat::Json),
            "raw" => Ok(PayloadFormat::Raw),
            other => Err(format!("unknown payload format: {}", other)),
        }
    }
}

/// An inbound message as received from the socket
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Frame text, verbatim
    pub raw: String,
    /// Parsed JSON, when the format is JSON and the frame parses
    pub data: Option<Value>,
}

impl Payload {
    /// Build a payload from a received text frame
    pub fn from_text(raw: impl Into<String>, format: PayloadFormat) -> Self {
        let raw = raw.into();
        let data = match format {
            PayloadFormat::Json => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(error = %e, "Payload is not valid JSON, keeping it opaque");
                    None
                }
            },
            PayloadFormat::Raw => None,
        };

        Self { raw, data }
    }

    /// Build a payload from a received binary frame
    pub fn from_binary(bytes: &[u8], format: PayloadFormat) -> Self {
        Self::from_text(String::from_utf8_lossy(bytes).into_owned(), format)
    }
}

/// Lifecycle and payload events, in socket order
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The socket is open
    Opened,
    /// The socket is closed (or never opened)
    Closed,
    /// The socket reported an error
    Error(String),
    /// A message frame arrived
    Message(Payload),
}

impl ConnectionEvent {
    /// Short name used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionEvent::Opened => "opened",
            ConnectionEvent::Closed => "closed",
            ConnectionEvent::Error(_) => "error",
            ConnectionEvent::Message(_) => "message",
        }
    }
}

/// Receiving end of the connection manager's event stream
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Where the connection manager pushes its events
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl EventSink {
    /// Create a sink and the receiver that drains it
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push an event. Returns false once the receiving side is gone.
    pub fn emit(&self, event: ConnectionEvent) -> bool {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::debug!(event = kind, "Event sink closed, dropping event");
            return false;
        }
        true
    }
}
