//! # Real-Time Module
//!
//! Change records in, subscriber notifications out.
//!
//! ## Architecture
//!
//! - **Event**: change records and the domain events derived from them
//! - **Interpreter** (pure): change record → at most one domain event
//! - **Subscriptions**: registry of live connections per subject
//! - **Dispatcher**: best-effort fan-out, drops connections that fail delivery
//! - **WebSocket**: wire protocol and per-connection session loop

pub mod connection;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod interpreter;
pub mod subscription;
pub mod websocket;

pub use connection::{Connection, ConnectionId, ConnectionReceiver, DEFAULT_OUTBOUND_CAPACITY};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use errors::{RealtimeError, RealtimeResult};
pub use event::{
    ChangeRecord, DocumentRemoval, DocumentRevision, DocumentSnapshot, DomainEvent, EntityKind,
    EventPayload, EventType, Operation, Row, SignatureRecord, StatusChange,
};
pub use interpreter::{interpret, interpret_bytes, FieldDiff};
pub use subscription::{Registration, SubscriberRegistry};
pub use websocket::{ClientMessage, ConnectionAck, ServerMessage, Session};
