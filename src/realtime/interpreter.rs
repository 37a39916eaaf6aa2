//! # Change Event Interpreter
//!
//! Pure transformation from a raw change record to at most one domain event.
//!
//! Document updates are diffed on a fixed watch-list of fields. A status
//! change wins over a title change, and a few terminal statuses re-type the
//! event to a more specific name. Signatures are append-only: only their
//! creation is broadcast, addressed to the signed document.
//!
//! Nothing here performs I/O or touches shared state. Records that cannot be
//! interpreted come back as `Err` for the caller to log and skip.

use serde_json::Value;

use super::errors::{RealtimeError, RealtimeResult};
use super::event::{
    ChangeRecord, DocumentRemoval, DocumentRevision, DocumentSnapshot, DomainEvent, EntityKind,
    EventPayload, EventType, Operation, Row, SignatureRecord, StatusChange,
};

/// Document fields whose changes are broadcast-worthy
pub const WATCHED_FIELDS: [&str; 3] = ["status", "title", "version"];

/// Interpret one change record for the given entity kind
pub fn interpret(entity: EntityKind, record: &ChangeRecord) -> RealtimeResult<Option<DomainEvent>> {
    match entity {
        EntityKind::Document => interpret_document(record),
        EntityKind::Signature => interpret_signature(record),
    }
}

/// Decode and interpret a JSON-encoded change record
pub fn interpret_bytes(entity: EntityKind, bytes: &[u8]) -> RealtimeResult<Option<DomainEvent>> {
    let record = ChangeRecord::from_slice(bytes)?;
    interpret(entity, &record)
}

fn interpret_document(record: &ChangeRecord) -> RealtimeResult<Option<DomainEvent>> {
    let (event_type, payload) = match record.op {
        Operation::Snapshot => return Ok(None),

        Operation::Create => {
            let after = require_after(record)?;
            let snapshot = DocumentSnapshot {
                id: text(after, "id")?,
                title: value(after, "title"),
                status: value(after, "status"),
                created_by: value(after, "created_by"),
                created_at: value(after, "created_at"),
            };
            (EventType::DocumentCreated, EventPayload::Created(snapshot))
        }

        Operation::Update => {
            let after = require_after(record)?;
            // Without a before image there is nothing to diff against
            let Some(before) = record.before.as_ref() else {
                return Ok(None);
            };
            let diff = FieldDiff::between(before, after);

            if let Some((old, new)) = diff.get("status") {
                let change = StatusChange {
                    id: text(after, "id")?,
                    title: value(after, "title"),
                    old_status: as_text("status", old)?,
                    new_status: as_text("status", new)?,
                    version: integer(after, "version")?,
                };
                let event_type = EventType::for_status(change.new_status.as_deref());
                (event_type, EventPayload::StatusChanged(change))
            } else if diff.contains("title") {
                let revision = DocumentRevision {
                    id: text(after, "id")?,
                    title: value(after, "title"),
                    version: integer(after, "version")?,
                };
                (EventType::DocumentUpdated, EventPayload::Revised(revision))
            } else {
                return Ok(None);
            }
        }

        Operation::Delete => {
            let Some(before) = record.before.as_ref() else {
                return Ok(None);
            };
            let removal = DocumentRemoval {
                id: text(before, "id")?,
                title: value(before, "title"),
            };
            if removal.id.is_none() {
                return Ok(None);
            }
            (EventType::DocumentDeleted, EventPayload::Deleted(removal))
        }
    };

    let subject_id = document_id(record)?.unwrap_or_default();
    Ok(Some(DomainEvent::new(
        event_type,
        subject_id,
        payload,
        record.source_timestamp(),
    )))
}

fn interpret_signature(record: &ChangeRecord) -> RealtimeResult<Option<DomainEvent>> {
    if record.op != Operation::Create {
        return Ok(None);
    }

    let after = require_after(record)?;
    let Some(document_id) = text(after, "document_id")? else {
        return Ok(None);
    };

    let signature = SignatureRecord {
        signature_id: text(after, "id")?,
        document_id: document_id.clone(),
        signer_name: value(after, "signer_name"),
        signer_email: value(after, "signer_email"),
        signed_at: value(after, "signed_at"),
    };

    Ok(Some(DomainEvent::new(
        EventType::SignatureAdded,
        document_id,
        EventPayload::SignatureAdded(signature),
        record.source_timestamp(),
    )))
}

/// Subject of a document record: the after image's id, else the before's
fn document_id(record: &ChangeRecord) -> RealtimeResult<Option<String>> {
    if let Some(id) = record.after.as_ref().map(|row| text(row, "id")).transpose()?.flatten() {
        return Ok(Some(id));
    }
    Ok(record
        .before
        .as_ref()
        .map(|row| text(row, "id"))
        .transpose()?
        .flatten())
}

fn require_after(record: &ChangeRecord) -> RealtimeResult<&Row> {
    record.after.as_ref().ok_or(RealtimeError::MissingImage {
        operation: record.op.as_str(),
        image: "after",
    })
}

/// Watched fields that differ between two row images.
///
/// A field absent from both images is unchanged; absent on one side only
/// counts as a change to or from null.
#[derive(Debug, Default, PartialEq)]
pub struct FieldDiff<'a> {
    changes: Vec<(&'static str, &'a Value, &'a Value)>,
}

impl<'a> FieldDiff<'a> {
    pub fn between(before: &'a Row, after: &'a Row) -> Self {
        let changes = WATCHED_FIELDS
            .iter()
            .filter_map(|&field| {
                let old = before.get(field).unwrap_or(&Value::Null);
                let new = after.get(field).unwrap_or(&Value::Null);
                (old != new).then_some((field, old, new))
            })
            .collect();
        Self { changes }
    }

    pub fn get(&self, field: &str) -> Option<(&'a Value, &'a Value)> {
        self.changes
            .iter()
            .find(|(name, _, _)| *name == field)
            .map(|(_, old, new)| (*old, *new))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Forwarded as-is; only addressing and status fields are typed
fn value(row: &Row, field: &str) -> Option<Value> {
    row.get(field).filter(|v| !v.is_null()).cloned()
}

fn text(row: &Row, field: &str) -> RealtimeResult<Option<String>> {
    row.get(field).map_or(Ok(None), |value| as_text(field, value))
}

fn as_text(field: &str, value: &Value) -> RealtimeResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        // Numeric primary keys are addressed by their decimal form
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(RealtimeError::InvalidField {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

fn integer(row: &Row, field: &str) -> RealtimeResult<Option<i64>> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| RealtimeError::InvalidField {
            field: field.to_string(),
            expected: "an integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    fn update(before: Value, after: Value) -> ChangeRecord {
        ChangeRecord::new(Operation::Update, Some(row(before)), Some(row(after)))
    }

    #[test]
    fn test_create_emits_created() {
        let record = ChangeRecord::new(
            Operation::Create,
            None,
            Some(row(json!({"id": "D1", "title": "Contract", "status": "created"}))),
        );

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentCreated);
        assert_eq!(event.subject_id, "D1");
        assert_eq!(
            serde_json::to_value(&event.payload).unwrap(),
            json!({"id": "D1", "title": "Contract", "status": "created"})
        );
    }

    #[test]
    fn test_create_projects_known_fields_only() {
        let record = ChangeRecord::new(
            Operation::Create,
            None,
            Some(row(json!({
                "id": "D1",
                "title": "Contract",
                "status": "created",
                "created_by": "alice",
                "created_at": 1700000000000i64,
                "s3_key": "documents/D1"
            }))),
        );

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        let data = serde_json::to_value(&event.payload).unwrap();
        assert_eq!(data["created_by"], "alice");
        assert_eq!(data["created_at"], 1700000000000i64);
        assert!(data.get("s3_key").is_none());
    }

    #[test]
    fn test_untyped_fields_are_forwarded_unchanged() {
        let record = ChangeRecord::new(
            Operation::Create,
            None,
            Some(row(json!({
                "id": "D1",
                "title": {"en": "Contract"},
                "created_by": ["alice", "bob"],
                "status": true
            }))),
        );
        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        let data = serde_json::to_value(&event.payload).unwrap();
        assert_eq!(data["title"], json!({"en": "Contract"}));
        assert_eq!(data["created_by"], json!(["alice", "bob"]));
        assert_eq!(data["status"], json!(true));

        let record = update(
            json!({"id": "D1", "status": "created", "title": false}),
            json!({"id": "D1", "status": "sent", "title": false}),
        );
        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentSent);
        assert_eq!(serde_json::to_value(&event.payload).unwrap()["title"], json!(false));

        let record = ChangeRecord::new(
            Operation::Create,
            None,
            Some(row(json!({"id": "S1", "document_id": "D1", "signer_name": 7}))),
        );
        let event = interpret(EntityKind::Signature, &record).unwrap().unwrap();
        assert_eq!(serde_json::to_value(&event.payload).unwrap()["signer_name"], json!(7));
    }

    #[test]
    fn test_status_change_to_signed() {
        let record = update(json!({"status": "sent"}), json!({"status": "signed", "version": 3}));

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentSigned);
        assert_eq!(
            event.payload,
            EventPayload::StatusChanged(StatusChange {
                id: None,
                title: None,
                old_status: Some("sent".into()),
                new_status: Some("signed".into()),
                version: Some(3),
            })
        );
        assert_eq!(
            serde_json::to_value(&event.payload).unwrap(),
            json!({"old_status": "sent", "new_status": "signed", "version": 3})
        );
    }

    #[test]
    fn test_generic_status_change() {
        let record = update(
            json!({"id": "D1", "status": "created", "version": 1}),
            json!({"id": "D1", "status": "archived", "version": 2}),
        );

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentStatusChanged);
        assert_eq!(event.subject_id, "D1");
    }

    #[test]
    fn test_status_wins_over_title() {
        let record = update(
            json!({"id": "D1", "status": "created", "title": "Draft"}),
            json!({"id": "D1", "status": "viewed", "title": "Final"}),
        );

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentViewed);
    }

    #[test]
    fn test_title_only_change() {
        let record = update(
            json!({"id": "D1", "status": "created", "title": "Draft", "version": 1}),
            json!({"id": "D1", "status": "created", "title": "Final", "version": 2}),
        );

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentUpdated);
        assert_eq!(
            event.payload,
            EventPayload::Revised(DocumentRevision {
                id: Some("D1".into()),
                title: Some(json!("Final")),
                version: Some(2),
            })
        );
    }

    #[test]
    fn test_version_only_change_is_silent() {
        let record = update(
            json!({"id": "D1", "status": "created", "version": 1}),
            json!({"id": "D1", "status": "created", "version": 2}),
        );

        assert_eq!(interpret(EntityKind::Document, &record).unwrap(), None);
    }

    #[test]
    fn test_unwatched_change_is_silent() {
        let record = update(
            json!({"id": "D1", "content_size": 10}),
            json!({"id": "D1", "content_size": 20}),
        );

        assert_eq!(interpret(EntityKind::Document, &record).unwrap(), None);
    }

    #[test]
    fn test_update_without_before_is_silent() {
        let record = ChangeRecord::new(
            Operation::Update,
            None,
            Some(row(json!({"id": "D1", "status": "signed"}))),
        );

        assert_eq!(interpret(EntityKind::Document, &record).unwrap(), None);
    }

    #[test]
    fn test_snapshot_is_silent() {
        let record = ChangeRecord::new(
            Operation::Snapshot,
            None,
            Some(row(json!({"id": "D1", "status": "created"}))),
        );

        assert_eq!(interpret(EntityKind::Document, &record).unwrap(), None);
        assert_eq!(interpret(EntityKind::Signature, &record).unwrap(), None);
    }

    #[test]
    fn test_delete_emits_deleted() {
        let record = ChangeRecord::new(
            Operation::Delete,
            Some(row(json!({"id": "D1", "title": "Contract", "status": "sent"}))),
            None,
        )
        .at(99);

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentDeleted);
        assert_eq!(event.subject_id, "D1");
        assert_eq!(event.timestamp, Some(99));
        assert_eq!(
            serde_json::to_value(&event.payload).unwrap(),
            json!({"id": "D1", "title": "Contract"})
        );
    }

    #[test]
    fn test_delete_without_subject_is_silent() {
        let record = ChangeRecord::new(Operation::Delete, Some(row(json!({"title": "x"}))), None);
        assert_eq!(interpret(EntityKind::Document, &record).unwrap(), None);

        let record = ChangeRecord::new(Operation::Delete, None, None);
        assert_eq!(interpret(EntityKind::Document, &record).unwrap(), None);
    }

    #[test]
    fn test_signature_added() {
        let record = ChangeRecord::new(
            Operation::Create,
            None,
            Some(row(json!({
                "id": "S1",
                "document_id": "D1",
                "signer_name": "Bob",
                "signer_email": "bob@example.com",
                "signed_at": "2024-01-01T00:00:00"
            }))),
        );

        let event = interpret(EntityKind::Signature, &record).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::SignatureAdded);
        assert_eq!(event.subject_id, "D1");
        assert_eq!(
            event.payload,
            EventPayload::SignatureAdded(SignatureRecord {
                signature_id: Some("S1".into()),
                document_id: "D1".into(),
                signer_name: Some(json!("Bob")),
                signer_email: Some(json!("bob@example.com")),
                signed_at: Some(json!("2024-01-01T00:00:00")),
            })
        );
    }

    #[test]
    fn test_signature_updates_are_never_diffed() {
        let record = update(
            json!({"id": "S1", "document_id": "D1", "status": "a"}),
            json!({"id": "S1", "document_id": "D1", "status": "b"}),
        );
        assert_eq!(interpret(EntityKind::Signature, &record).unwrap(), None);

        let record = ChangeRecord::new(
            Operation::Delete,
            Some(row(json!({"id": "S1", "document_id": "D1"}))),
            None,
        );
        assert_eq!(interpret(EntityKind::Signature, &record).unwrap(), None);
    }

    #[test]
    fn test_signature_without_document_is_silent() {
        let record = ChangeRecord::new(Operation::Create, None, Some(row(json!({"id": "S1"}))));
        assert_eq!(interpret(EntityKind::Signature, &record).unwrap(), None);
    }

    #[test]
    fn test_numeric_ids_are_addressable() {
        let record = ChangeRecord::new(
            Operation::Create,
            None,
            Some(row(json!({"id": 42, "title": "Contract"}))),
        );

        let event = interpret(EntityKind::Document, &record).unwrap().unwrap();
        assert_eq!(event.subject_id, "42");
    }

    #[test]
    fn test_malformed_records_are_errors() {
        let record = ChangeRecord::new(Operation::Create, None, None);
        assert!(matches!(
            interpret(EntityKind::Document, &record),
            Err(RealtimeError::MissingImage { image: "after", .. })
        ));

        let record = update(
            json!({"id": "D1", "status": "created"}),
            json!({"id": "D1", "status": ["signed"]}),
        );
        assert!(matches!(
            interpret(EntityKind::Document, &record),
            Err(RealtimeError::InvalidField { .. })
        ));

        let record = update(
            json!({"id": "D1", "status": "created"}),
            json!({"id": "D1", "status": "sent", "version": "two"}),
        );
        assert!(matches!(
            interpret(EntityKind::Document, &record),
            Err(RealtimeError::InvalidField { .. })
        ));

        assert!(interpret_bytes(EntityKind::Document, b"{").is_err());
    }

    #[test]
    fn test_interpret_bytes_debezium_envelope() {
        let bytes = br#"{
            "op": "u",
            "before": {"id": "D1", "status": "created", "title": "Contract", "version": 1},
            "after": {"id": "D1", "status": "sent", "title": "Contract", "version": 2},
            "source": {"ts_ms": 1700000000123}
        }"#;

        let event = interpret_bytes(EntityKind::Document, bytes).unwrap().unwrap();
        assert_eq!(event.event_type, EventType::DocumentSent);
        assert_eq!(event.timestamp, Some(1700000000123));
    }

    #[test]
    fn test_interpretation_is_deterministic() {
        let record = update(
            json!({"id": "D1", "status": "sent"}),
            json!({"id": "D1", "status": "signed", "version": 3}),
        );

        let first = interpret(EntityKind::Document, &record).unwrap();
        let second = interpret(EntityKind::Document, &record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_field_diff() {
        let before = row(json!({"status": "a", "title": "t", "version": 1}));
        let after = row(json!({"status": "b", "title": "t"}));

        let diff = FieldDiff::between(&before, &after);
        assert!(diff.contains("status"));
        assert!(!diff.contains("title"));
        assert_eq!(diff.get("version"), Some((&json!(1), &Value::Null)));

        let same = FieldDiff::between(&before, &before);
        assert!(same.is_empty());
    }
}
