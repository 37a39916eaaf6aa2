//! # Subscriber Connections
//!
//! Handle to one live subscriber channel. The gateway owns the receiving
//! half and drains it into the socket; the registry and dispatcher only ever
//! hold cloned handles.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::errors::{RealtimeError, RealtimeResult};
use super::websocket::ServerMessage;

/// Opaque connection identifier
pub type ConnectionId = Uuid;

/// Default bound of a connection's outbound queue
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Sending half of a subscriber channel
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<ServerMessage>,
    closed: Arc<watch::Sender<bool>>,
}

/// Receiving half of a subscriber channel, owned by the connection's task
#[derive(Debug)]
pub struct ConnectionReceiver {
    messages: mpsc::Receiver<ServerMessage>,
    closed: watch::Receiver<bool>,
}

impl Connection {
    /// Create a connection with a bounded outbound queue
    pub fn channel(capacity: usize) -> (Connection, ConnectionReceiver) {
        let (outbound, messages) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed) = watch::channel(false);

        let connection = Connection {
            id: Uuid::new_v4(),
            outbound,
            closed: Arc::new(closed_tx),
        };
        (connection, ConnectionReceiver { messages, closed })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message without waiting.
    ///
    /// A full queue means the subscriber is not draining fast enough and is
    /// reported as [`RealtimeError::SlowConsumer`].
    pub fn try_deliver(&self, message: ServerMessage) -> RealtimeResult<()> {
        if self.is_closed() {
            return Err(RealtimeError::ConnectionClosed);
        }
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RealtimeError::SlowConsumer,
            mpsc::error::TrySendError::Closed(_) => RealtimeError::ConnectionClosed,
        })
    }

    /// Signal the owning task to shut the channel down
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.outbound.is_closed()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl ConnectionReceiver {
    /// Next queued message, or `None` once the connection has been closed
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        if *self.closed.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.closed.changed() => None,
            message = self.messages.recv() => message,
        }
    }

    /// Next queued message if one is ready
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        self.messages.try_recv().ok()
    }

    /// Next queued message as its JSON wire form
    pub async fn recv_json(&mut self) -> Option<Value> {
        let message = self.recv().await?;
        serde_json::to_value(&message).ok()
    }
}
