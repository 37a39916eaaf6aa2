//! # WebSocket Sessions
//!
//! Wire protocol and per-connection receive loop for subscribers.
//!
//! A session registers its connection once the handshake has been
//! authenticated, acknowledges with `connection.established`, then
//! multiplexes two sources until either side goes away: inbound control
//! frames from the client, and outbound messages queued by the dispatcher.

use std::borrow::Cow;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::connection::{Connection, DEFAULT_OUTBOUND_CAPACITY};
use super::errors::{RealtimeError, RealtimeResult};
use super::event::DomainEvent;
use super::subscription::SubscriberRegistry;
use crate::auth::{AuthError, Identity};

/// WebSocket message from client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive; answered with a pong echoing the timestamp
    Ping {
        #[serde(default)]
        timestamp: Option<Value>,
    },

    /// Request to follow another subject (not supported mid-connection)
    Subscribe {
        #[serde(default)]
        document_id: Option<String>,
    },

    /// Any other control type
    #[serde(other)]
    Unknown,
}

/// Payload of the `connection.established` acknowledgment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionAck {
    pub document_id: String,
    pub user_id: String,
    pub email: String,
    pub message: String,
}

/// WebSocket message to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Domain event from the change stream
    Event(DomainEvent),

    /// Operator-supplied message, forwarded verbatim
    Raw(Value),

    /// Handshake acknowledgment
    ConnectionEstablished(ConnectionAck),

    /// Reply to a client ping
    Pong { timestamp: Option<Value> },

    /// Best-effort error notification
    Error { message: String },
}

impl ServerMessage {
    pub fn established(subject_id: &str, identity: &Identity) -> Self {
        ServerMessage::ConnectionEstablished(ConnectionAck {
            document_id: subject_id.to_string(),
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            message: format!("Connected to document {subject_id}"),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Value of the envelope's `type` field
    pub fn type_name(&self) -> &str {
        match self {
            ServerMessage::Event(event) => event.event_type.as_str(),
            ServerMessage::Raw(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("broadcast"),
            ServerMessage::ConnectionEstablished(_) => "connection.established",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }
}

impl Serialize for ServerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ServerMessage::Event(event) => event.serialize(serializer),
            ServerMessage::Raw(value) => value.serialize(serializer),
            ServerMessage::ConnectionEstablished(ack) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", self.type_name())?;
                map.serialize_entry("data", ack)?;
                map.end()
            }
            ServerMessage::Pong { timestamp } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", self.type_name())?;
                map.serialize_entry("timestamp", timestamp)?;
                map.end()
            }
            ServerMessage::Error { message } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", self.type_name())?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}

/// Parse a text frame into a control message
pub fn parse_client_message(text: &str) -> RealtimeResult<ClientMessage> {
    let value: Value = serde_json::from_str(text)
        .map_err(|_| RealtimeError::InvalidMessage("Invalid JSON".to_string()))?;
    serde_json::from_value(value).map_err(|e| RealtimeError::InvalidMessage(e.to_string()))
}

/// Handle one inbound text frame, returning the reply to send, if any
pub fn handle_control_frame(
    text: &str,
    subject_id: &str,
    identity: &Identity,
) -> Option<ServerMessage> {
    let message = match parse_client_message(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(subject_id, email = %identity.email, error = %e, "malformed control frame");
            return Some(ServerMessage::error(e.to_string()));
        }
    };

    match message {
        ClientMessage::Ping { timestamp } => Some(ServerMessage::Pong { timestamp }),
        ClientMessage::Subscribe { document_id } => {
            info!(
                subject_id,
                email = %identity.email,
                requested = ?document_id,
                "subscription change requested; connections follow a single subject"
            );
            None
        }
        ClientMessage::Unknown => {
            debug!(subject_id, frame = text, "ignoring unrecognized control message");
            None
        }
    }
}

/// Everything a session needs once its handshake has been authenticated
#[derive(Debug, Clone)]
pub struct Session {
    pub subject_id: String,
    pub identity: Identity,
    pub registry: Arc<SubscriberRegistry>,
    pub outbound_capacity: usize,
}

impl Session {
    pub fn new(subject_id: String, identity: Identity, registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            subject_id,
            identity,
            registry,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(text)).await
}

/// Run an authenticated subscriber session until it disconnects
pub async fn run_session(socket: WebSocket, session: Session) {
    let Session {
        subject_id,
        identity,
        registry,
        outbound_capacity,
    } = session;

    let (connection, mut outbound) = Connection::channel(outbound_capacity);
    registry.register(&connection, &subject_id, identity.clone());
    info!(
        connection_id = %connection.id(),
        subject_id = %subject_id,
        email = %identity.email,
        subscribers = registry.count_for(&subject_id),
        "websocket connected"
    );

    let (mut sink, mut stream) = socket.split();

    let ack = ServerMessage::established(&subject_id, &identity);
    if let Err(e) = send(&mut sink, &ack).await {
        warn!(connection_id = %connection.id(), error = %e, "failed to acknowledge connection");
    } else {
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_control_frame(&text, &subject_id, &identity) {
                            if let Err(e) = send(&mut sink, &reply).await {
                                warn!(connection_id = %connection.id(), error = %e, "failed to reply");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let reply = ServerMessage::error("Binary frames are not supported");
                        if send(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(connection_id = %connection.id(), email = %identity.email, "client disconnected");
                        break;
                    }
                    // Protocol pings are answered by the transport
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(connection_id = %connection.id(), error = %e, "websocket receive error");
                        break;
                    }
                },

                outgoing = outbound.recv() => match outgoing {
                    Some(message) => {
                        if let Err(e) = send(&mut sink, &message).await {
                            warn!(connection_id = %connection.id(), error = %e, "failed to send message");
                            break;
                        }
                    }
                    None => {
                        debug!(connection_id = %connection.id(), "connection closed by dispatcher");
                        let frame = CloseFrame {
                            code: close_code::AGAIN,
                            reason: Cow::Borrowed("Delivery failed"),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        break;
                    }
                },
            }
        }
    }

    registry.unregister(&connection.id());
    connection.close();
    info!(
        connection_id = %connection.id(),
        subject_id = %subject_id,
        "websocket session ended"
    );
}

/// Refuse an unauthenticated handshake with a policy-violation close frame
pub async fn reject(mut socket: WebSocket, error: AuthError) {
    let frame = CloseFrame {
        code: error.close_code(),
        reason: Cow::Borrowed(error.close_reason()),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "failed to send rejection close frame");
    }
}
