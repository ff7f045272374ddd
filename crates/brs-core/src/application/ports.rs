//! Connection ports
//!
//! Application services talk to peers only through [`MessageSink`]; the
//! websocket adapter and tests provide implementations.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Failure delivering a frame to a peer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer's outbound channel is gone
    #[error("connection closed")]
    Closed,
    /// The transport refused the frame
    #[error("send rejected: {0}")]
    Rejected(String),
}

/// Something that accepts encoded frames for one peer.
///
/// Sending never blocks; ordering of frames sent through one sink is
/// preserved.
pub trait MessageSink: Send + Sync {
    /// Queue `text` for delivery
    fn send_message(&self, text: String) -> Result<(), TransportError>;
}

impl MessageSink for mpsc::UnboundedSender<String> {
    fn send_message(&self, text: String) -> Result<(), TransportError> {
        self.send(text).map_err(|_| TransportError::Closed)
    }
}

/// Unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a connected peer
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    sink: Arc<dyn MessageSink>,
}

impl Connection {
    /// Wrap a sink under a fresh id
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            id: ConnectionId::new(),
            sink,
        }
    }

    /// Connection backed by an unbounded channel, returning the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(Arc::new(tx)), rx)
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sink frames for this peer go to
    pub fn sink(&self) -> Arc<dyn MessageSink> {
        Arc::clone(&self.sink)
    }

    /// Queue an encoded frame
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.sink.send_message(text)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}
