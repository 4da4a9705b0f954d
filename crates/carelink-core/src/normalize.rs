//! Raw message → canonical event.
//!
//! `normalize` is a pure function of the raw bytes and their declared
//! encoding: the same input always yields the same event, id included, so
//! re-ingestion is deduplicated downstream. Missing or malformed parts of a
//! message degrade to empty fields; normalization itself cannot fail.

use serde_json::{json, Map, Value};

use crate::event::{event_id, parse_timestamp, CanonicalEvent, EventType, RawMessage, SourceEncoding, SCHEMA_VERSION};
use crate::protocol::hl7::Hl7Message;
use crate::protocol::intake::IntakeEnvelope;

/// Normalize any supported raw message.
pub fn normalize(raw: &RawMessage) -> CanonicalEvent {
    match raw.encoding {
        SourceEncoding::Hl7v2 => normalize_hl7(raw),
        SourceEncoding::Json => normalize_json(raw),
    }
}

fn normalize_hl7(raw: &RawMessage) -> CanonicalEvent {
    let msg = Hl7Message::parse(&raw.text());

    let message_type = msg.field_joined("MSH", 9, "^").into_string();
    let trigger = msg.component("MSH", 9, 2).into_string();
    let event_type = if trigger.is_empty() {
        EventType::classify(&message_type)
    } else {
        EventType::classify(&trigger)
    };
    let control_id = msg.field("MSH", 10).into_string();
    let facility_id = msg.component("MSH", 4, 1).into_string();
    let patient_id = msg.component("PID", 3, 1).into_string();
    let timestamp = parse_timestamp(msg.field("MSH", 7).as_str());

    let payload = json!({
        "message_type": message_type,
        "control_id": control_id,
        "patient_name": {
            "family": msg.component("PID", 5, 1).into_string(),
            "given": msg.component("PID", 5, 2).into_string(),
        },
        "patient_class": msg.field("PV1", 2).into_string(),
        "assigned_location": msg.field_joined("PV1", 3, "^").into_string(),
        "segments": msg.segment_names(),
        "malformed_segments": msg.malformed_count(),
    });

    let id = event_id(raw.encoding, &facility_id, &control_id, &raw.bytes);
    tracing::debug!(event_id = %id, %message_type, "normalized hl7 message");

    CanonicalEvent {
        schema_version: SCHEMA_VERSION,
        id,
        event_type,
        patient_id,
        facility_id,
        timestamp,
        payload,
    }
}

fn normalize_json(raw: &RawMessage) -> CanonicalEvent {
    let Some(env) = IntakeEnvelope::parse(&raw.bytes) else {
        // Unreadable envelope: still a deterministic, empty update event.
        return CanonicalEvent {
            schema_version: SCHEMA_VERSION,
            id: event_id(raw.encoding, "", "", &raw.bytes),
            event_type: EventType::Update,
            patient_id: String::new(),
            facility_id: String::new(),
            timestamp: None,
            payload: json!({ "malformed": true }),
        };
    };

    let event_type =
        EventType::from_name(&env.event_code).unwrap_or_else(|| EventType::classify_message_type(&env.event_code));
    let timestamp = env.timestamp.as_deref().and_then(parse_timestamp);

    let mut payload = Map::new();
    payload.insert("message_type".into(), Value::String(env.event_code.clone()));
    payload.insert("control_id".into(), Value::String(env.control_id.clone()));
    if let Some(data) = env.data {
        payload.insert("data".into(), data);
    }

    CanonicalEvent {
        schema_version: SCHEMA_VERSION,
        id: event_id(raw.encoding, &env.facility_id, &env.control_id, &raw.bytes),
        event_type,
        patient_id: env.patient_id,
        facility_id: env.facility_id,
        timestamp,
        payload: Value::Object(payload),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn json_intake_maps_onto_canonical_fields() {
        let raw = RawMessage::json(
            r#"{"type":"discharge","patient_id":"p9","facility_id":"north","control_id":"7",
               "timestamp":"20240301080000","data":{"reason":"home"}}"#,
        );
        let ev = normalize(&raw);
        assert_eq!(ev.event_type, EventType::Discharge);
        assert_eq!(ev.patient_id, "p9");
        assert_eq!(ev.facility_id, "north");
        assert!(ev.timestamp.is_some());
        assert_eq!(ev.payload["data"]["reason"], "home");
    }

    #[test]
    fn json_intake_accepts_hl7_trigger_codes() {
        let ev = normalize(&RawMessage::json(r#"{"type":"ADT^A02"}"#));
        assert_eq!(ev.event_type, EventType::Transfer);
    }

    #[test]
    fn bad_timestamp_keeps_the_other_fields() {
        let ev = normalize(&RawMessage::json(
            r#"{"type":"admission","patient_id":"p1","facility_id":"north","control_id":"9","timestamp":1704457800}"#,
        ));
        assert_eq!(ev.event_type, EventType::Admission);
        assert_eq!(ev.patient_id, "p1");
        assert_eq!(ev.facility_id, "north");
        assert!(ev.timestamp.is_none());
        assert!(ev.payload.get("malformed").is_none());
    }

    #[test]
    fn json_intake_ignores_message_structure() {
        let ev = normalize(&RawMessage::json(r#"{"type":"ADT^A08^ADT_A01","patient_id":"p1"}"#));
        assert_eq!(ev.event_type, EventType::Update);
    }

    #[test]
    fn unreadable_json_degrades_to_update() {
        let a = normalize(&RawMessage::json("{not json"));
        let b = normalize(&RawMessage::json("{not json"));
        assert_eq!(a.event_type, EventType::Update);
        assert!(a.patient_id.is_empty());
        assert_eq!(a.id, b.id);
    }
}
