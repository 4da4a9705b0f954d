//! JSON intake envelope.
//!
//! Producers that already emit JSON send this envelope instead of HL7.
//! `data` is kept as an arbitrary JSON value and carried into the canonical
//! payload untouched. Fields are read one at a time: a field of the wrong
//! type degrades to empty on its own and leaves the others intact.

use serde_json::{Map, Value};

/// JSON intake envelope.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IntakeEnvelope {
    /// Source event code (e.g., "ADT^A03" or "discharge"), read from `type`.
    pub event_code: String,
    pub patient_id: String,
    pub facility_id: String,
    /// Source sequence / control id, used as id discriminator.
    pub control_id: String,
    /// RFC 3339 or HL7 `YYYYMMDD[HHMM[SS]]` timestamp.
    pub timestamp: Option<String>,
    pub data: Option<Value>,
}

impl IntakeEnvelope {
    /// Decode an envelope; `None` only when the bytes are not a JSON object.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let mut obj = match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(obj)) => obj,
            Ok(_) => {
                tracing::debug!("intake envelope rejected: not a JSON object");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "intake envelope rejected");
                return None;
            }
        };

        Some(Self {
            event_code: text_field(&obj, "type"),
            patient_id: text_field(&obj, "patient_id"),
            facility_id: text_field(&obj, "facility_id"),
            control_id: text_field(&obj, "control_id"),
            timestamp: match obj.get("timestamp") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(other) => {
                    tracing::debug!(value = %other, "intake timestamp ignored: not a string");
                    None
                }
            },
            data: obj.remove("data").filter(|v| !v.is_null()),
        })
    }
}

/// Strings pass through and numbers keep their JSON text; anything else is empty.
fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            tracing::debug!(field = key, value = %other, "intake field ignored: not a string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parse_envelope_min() {
        let env = IntakeEnvelope::parse(br#"{"type":"discharge"}"#).unwrap();
        assert_eq!(env.event_code, "discharge");
        assert!(env.patient_id.is_empty());
        assert!(env.data.is_none());
    }

    #[test]
    fn parse_envelope_full() {
        let env = IntakeEnvelope::parse(
            br#"{"type":"ADT^A02","patient_id":"p1","facility_id":"f1","control_id":"42",
                "timestamp":"2024-01-05T12:30:00Z","data":{"bed":"7"},"extra":true}"#,
        )
        .unwrap();
        assert_eq!(env.patient_id, "p1");
        assert_eq!(env.control_id, "42");
        assert_eq!(env.timestamp.as_deref(), Some("2024-01-05T12:30:00Z"));
        assert_eq!(env.data.unwrap()["bed"], "7");
    }

    #[test]
    fn wrong_typed_fields_degrade_one_at_a_time() {
        let env = IntakeEnvelope::parse(
            br#"{"type":"admission","patient_id":"p1","facility_id":["north"],
                "control_id":17,"timestamp":1704457800}"#,
        )
        .unwrap();
        assert_eq!(env.event_code, "admission");
        assert_eq!(env.patient_id, "p1");
        assert!(env.facility_id.is_empty());
        assert_eq!(env.control_id, "17");
        assert!(env.timestamp.is_none());
    }

    #[test]
    fn non_json_is_none() {
        assert!(IntakeEnvelope::parse(b"MSH|^~\\&").is_none());
        assert!(IntakeEnvelope::parse(b"[1,2]").is_none());
    }
}
