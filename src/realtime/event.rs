//! # Real-Time Events
//!
//! Raw change records as they arrive from the change stream, and the domain
//! events derived from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{RealtimeError, RealtimeResult};

/// One row image (`before` or `after`) of a change record
pub type Row = Map<String, Value>;

/// Row-level operation carried by a change record.
///
/// Accepts both the single-letter CDC codes and spelled-out names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "c", alias = "create")]
    Create,
    #[serde(rename = "u", alias = "update")]
    Update,
    #[serde(rename = "d", alias = "delete")]
    Delete,
    /// Initial snapshot read; never broadcast
    #[serde(rename = "r", alias = "snapshot", alias = "read")]
    Snapshot,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Snapshot => "snapshot",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source metadata attached by the capture connector
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceInfo {
    /// Commit time in the source database (epoch millis)
    #[serde(default)]
    pub ts_ms: Option<i64>,
}

/// Raw change record from the upstream stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeRecord {
    #[serde(alias = "operation")]
    pub op: Operation,

    #[serde(default)]
    pub before: Option<Row>,

    #[serde(default)]
    pub after: Option<Row>,

    #[serde(default)]
    pub source: Option<SourceInfo>,

    /// Capture time, used when the source block carries none
    #[serde(default, alias = "sourceTimestamp")]
    pub ts_ms: Option<i64>,
}

impl ChangeRecord {
    /// Create a record without source metadata
    pub fn new(op: Operation, before: Option<Row>, after: Option<Row>) -> Self {
        Self {
            op,
            before,
            after,
            source: None,
            ts_ms: None,
        }
    }

    /// Attach a source timestamp
    pub fn at(mut self, ts_ms: i64) -> Self {
        self.source = Some(SourceInfo { ts_ms: Some(ts_ms) });
        self
    }

    /// Decode a JSON change record.
    ///
    /// Records produced with converter schemas enabled arrive wrapped as
    /// `{"schema": ..., "payload": {...}}` and are unwrapped first.
    pub fn from_slice(bytes: &[u8]) -> RealtimeResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| RealtimeError::InvalidRecord(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON change record
    pub fn from_value(value: Value) -> RealtimeResult<Self> {
        let value = match value {
            Value::Object(mut envelope)
                if !envelope.contains_key("op") && envelope.contains_key("payload") =>
            {
                envelope.remove("payload").unwrap_or(Value::Null)
            }
            other => other,
        };

        serde_json::from_value(value).map_err(|e| RealtimeError::InvalidRecord(e.to_string()))
    }

    /// Source timestamp of the change, if known
    pub fn source_timestamp(&self) -> Option<i64> {
        self.source
            .as_ref()
            .and_then(|source| source.ts_ms)
            .or(self.ts_ms)
    }
}

/// Kind of entity a change stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Document,
    Signature,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Document => "document",
            EntityKind::Signature => "signature",
        }
    }
}

/// Type of domain event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "document.created")]
    DocumentCreated,
    #[serde(rename = "document.updated")]
    DocumentUpdated,
    #[serde(rename = "document.status_changed")]
    DocumentStatusChanged,
    #[serde(rename = "document.signed")]
    DocumentSigned,
    #[serde(rename = "document.viewed")]
    DocumentViewed,
    #[serde(rename = "document.sent")]
    DocumentSent,
    #[serde(rename = "document.deleted")]
    DocumentDeleted,
    #[serde(rename = "signature.added")]
    SignatureAdded,
}

impl EventType {
    /// Most specific event type for a document entering `status`
    pub fn for_status(status: Option<&str>) -> Self {
        match status {
            Some("signed") => EventType::DocumentSigned,
            Some("viewed") => EventType::DocumentViewed,
            Some("sent") => EventType::DocumentSent,
            _ => EventType::DocumentStatusChanged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DocumentCreated => "document.created",
            EventType::DocumentUpdated => "document.updated",
            EventType::DocumentStatusChanged => "document.status_changed",
            EventType::DocumentSigned => "document.signed",
            EventType::DocumentViewed => "document.viewed",
            EventType::DocumentSent => "document.sent",
            EventType::DocumentDeleted => "document.deleted",
            EventType::SignatureAdded => "signature.added",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projection of a newly created document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
}

/// Status transition of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub version: Option<i64>,
}

/// Non-status revision of a document (title change)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentRevision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: Option<Value>,
    pub version: Option<i64>,
}

/// Identity of a deleted document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentRemoval {
    pub id: Option<String>,
    pub title: Option<Value>,
}

/// Signature appended to a document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignatureRecord {
    pub signature_id: Option<String>,
    pub document_id: String,
    pub signer_name: Option<Value>,
    pub signer_email: Option<Value>,
    pub signed_at: Option<Value>,
}

/// Event payload, one variant per payload shape.
///
/// Serialized untagged: the event's `type` field carries the tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Created(DocumentSnapshot),
    StatusChanged(StatusChange),
    Revised(DocumentRevision),
    Deleted(DocumentRemoval),
    SignatureAdded(SignatureRecord),
}

/// Domain event addressed to one subject.
///
/// Serializes as the outbound envelope `{"type", "data", "timestamp"}`;
/// the subject is routing metadata and not part of the wire form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    #[serde(skip)]
    pub subject_id: String,

    #[serde(rename = "data")]
    pub payload: EventPayload,

    /// Source commit time (epoch millis)
    pub timestamp: Option<i64>,
}

impl DomainEvent {
    pub fn new(
        event_type: EventType,
        subject_id: impl Into<String>,
        payload: EventPayload,
        timestamp: Option<i64>,
    ) -> Self {
        Self {
            event_type,
            subject_id: subject_id.into(),
            payload,
            timestamp,
        }
    }

    /// Whether the event resolved to a subject anyone could subscribe to
    pub fn is_addressable(&self) -> bool {
        !self.subject_id.is_empty()
    }
}
