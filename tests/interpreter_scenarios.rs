//! Change record interpretation against realistic Debezium messages.

use changecast::realtime::{interpret_bytes, EntityKind, EventType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

const STATUSES: [Option<&str>; 8] = [
    Some("created"),
    Some("sent"),
    Some("viewed"),
    Some("signed"),
    Some("declined"),
    Some("archived"),
    Some(""),
    None,
];

fn interpret_json(entity: EntityKind, record: Value) -> Option<Value> {
    let bytes = serde_json::to_vec(&record).unwrap();
    interpret_bytes(entity, &bytes)
        .unwrap()
        .map(|event| {
            let mut wire = serde_json::to_value(&event).unwrap();
            wire["subject"] = json!(event.subject_id);
            wire
        })
}

#[test]
fn document_create_becomes_document_created() {
    let event = interpret_json(
        EntityKind::Document,
        json!({
            "op": "c",
            "before": null,
            "after": {"id": "D1", "title": "Contract", "status": "created"},
            "source": {"ts_ms": 1700000000000i64}
        }),
    )
    .unwrap();

    assert_eq!(event["type"], "document.created");
    assert_eq!(event["subject"], "D1");
    assert_eq!(
        event["data"],
        json!({"id": "D1", "title": "Contract", "status": "created"})
    );
    assert_eq!(event["timestamp"], 1700000000000i64);
}

#[test]
fn status_change_to_signed_is_retyped() {
    let event = interpret_json(
        EntityKind::Document,
        json!({
            "op": "u",
            "before": {"status": "sent"},
            "after": {"status": "signed", "version": 3}
        }),
    )
    .unwrap();

    assert_eq!(event["type"], EventType::DocumentSigned.as_str());
    assert_eq!(event["data"]["old_status"], "sent");
    assert_eq!(event["data"]["new_status"], "signed");
    assert_eq!(event["data"]["version"], 3);
}

#[test]
fn status_change_priority_over_title() {
    let event = interpret_json(
        EntityKind::Document,
        json!({
            "op": "u",
            "before": {"id": "D1", "title": "Draft", "status": "created"},
            "after": {"id": "D1", "title": "Final", "status": "sent"}
        }),
    )
    .unwrap();

    assert_eq!(event["type"], "document.sent");
    assert_eq!(event["subject"], "D1");
}

#[test]
fn every_status_transition_yields_one_most_specific_event() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..500 {
        let old = STATUSES[rng.gen_range(0..STATUSES.len())];
        let new = STATUSES[rng.gen_range(0..STATUSES.len())];
        if old == new {
            continue;
        }
        let (old_title, new_title) = if rng.gen_bool(0.5) {
            ("Draft", "Final")
        } else {
            ("Draft", "Draft")
        };
        let old_version = rng.gen_range(1..5i64);
        let new_version = old_version + rng.gen_range(0..2i64);

        let event = interpret_json(
            EntityKind::Document,
            json!({
                "op": "u",
                "before": {"id": "D1", "status": old, "title": old_title, "version": old_version},
                "after": {"id": "D1", "status": new, "title": new_title, "version": new_version}
            }),
        )
        .unwrap_or_else(|| panic!("{old:?} -> {new:?} produced no event"));

        let expected = match new {
            Some("signed") => "document.signed",
            Some("viewed") => "document.viewed",
            Some("sent") => "document.sent",
            _ => "document.status_changed",
        };
        assert_eq!(event["type"], expected, "{old:?} -> {new:?}");
        assert_eq!(event["subject"], "D1");
        assert_eq!(event["data"]["old_status"], json!(old), "{old:?} -> {new:?}");
        assert_eq!(event["data"]["new_status"], json!(new), "{old:?} -> {new:?}");
        assert_eq!(event["data"]["version"], new_version);
    }
}

#[test]
fn title_only_change_is_document_updated() {
    let event = interpret_json(
        EntityKind::Document,
        json!({
            "op": "u",
            "before": {"id": "D1", "title": "Draft", "version": 1},
            "after": {"id": "D1", "title": "Final", "version": 1}
        }),
    )
    .unwrap();

    assert_eq!(event["type"], "document.updated");
    assert_eq!(event["data"]["title"], "Final");
}

#[test]
fn unwatched_field_change_is_ignored() {
    let event = interpret_json(
        EntityKind::Document,
        json!({
            "op": "u",
            "before": {"id": "D1", "status": "sent", "file_size": 10},
            "after": {"id": "D1", "status": "sent", "file_size": 20}
        }),
    );

    assert!(event.is_none());
}

#[test]
fn snapshot_reads_are_ignored() {
    for entity in [EntityKind::Document, EntityKind::Signature] {
        let event = interpret_json(
            entity,
            json!({"op": "r", "after": {"id": "D1", "document_id": "D1"}}),
        );
        assert!(event.is_none());
    }
}

#[test]
fn delete_uses_before_image() {
    let event = interpret_json(
        EntityKind::Document,
        json!({"op": "d", "before": {"id": "D9", "title": "Old"}, "after": null}),
    )
    .unwrap();

    assert_eq!(event["type"], "document.deleted");
    assert_eq!(event["subject"], "D9");
}

#[test]
fn signature_create_addresses_the_document() {
    let event = interpret_json(
        EntityKind::Signature,
        json!({
            "schema": {},
            "payload": {
                "op": "c",
                "after": {
                    "id": "S1",
                    "document_id": "D1",
                    "signer_name": "Ada",
                    "signer_email": "ada@example.com"
                },
                "source": {"ts_ms": 5}
            }
        }),
    )
    .unwrap();

    assert_eq!(event["type"], "signature.added");
    assert_eq!(event["subject"], "D1");
    assert_eq!(event["data"]["signature_id"], "S1");
    assert_eq!(event["data"]["signer_email"], "ada@example.com");
}

#[test]
fn signature_updates_are_ignored() {
    let event = interpret_json(
        EntityKind::Signature,
        json!({
            "op": "u",
            "before": {"id": "S1", "document_id": "D1"},
            "after": {"id": "S1", "document_id": "D1"}
        }),
    );

    assert!(event.is_none());
}

#[test]
fn garbage_is_an_error_not_a_panic() {
    assert!(interpret_bytes(EntityKind::Document, b"not json").is_err());
    assert!(interpret_bytes(EntityKind::Document, br#"{"op": "z"}"#).is_err());
}
