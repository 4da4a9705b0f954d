//! Canonical event model.
//!
//! Every source format normalizes into [`CanonicalEvent`]. The persisted form
//! is JSON with camelCase field names and an explicit `schemaVersion`; field
//! names are part of the hand-off contract and must not change without a
//! version bump.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Unit separator between id hash inputs.
const FIELD_SEP: &[u8] = b"\x1f";

/// Current canonical event schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Declared encoding of a raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEncoding {
    /// Pipe-delimited HL7 v2 text.
    Hl7v2,
    /// JSON intake envelope.
    Json,
}

impl SourceEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceEncoding::Hl7v2 => "hl7v2",
            SourceEncoding::Json => "json",
        }
    }
}

/// Raw message bytes plus their declared encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub encoding: SourceEncoding,
    pub bytes: Bytes,
}

impl RawMessage {
    pub fn new(encoding: SourceEncoding, bytes: impl Into<Bytes>) -> Self {
        Self {
            encoding,
            bytes: bytes.into(),
        }
    }

    pub fn hl7(text: impl Into<Bytes>) -> Self {
        Self::new(SourceEncoding::Hl7v2, text)
    }

    pub fn json(bytes: impl Into<Bytes>) -> Self {
        Self::new(SourceEncoding::Json, bytes)
    }

    /// Lossy UTF-8 view; invalid sequences become U+FFFD.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Canonical event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Admission,
    Discharge,
    Transfer,
    Update,
}

/// Ordered trigger-code table; first substring match wins.
const TRIGGER_CODES: [(&str, EventType); 3] = [
    ("A01", EventType::Admission),
    ("A03", EventType::Discharge),
    ("A02", EventType::Transfer),
];

impl EventType {
    /// Classify a message-type code (e.g. `ADT^A01`). Unmatched codes are `Update`.
    pub fn classify(code: &str) -> Self {
        TRIGGER_CODES
            .iter()
            .find(|(needle, _)| code.contains(needle))
            .map(|(_, ty)| *ty)
            .unwrap_or(EventType::Update)
    }

    /// Classify on the trigger event of a `TYPE^TRIGGER[^STRUCTURE]` code.
    /// The structure component (e.g. `ADT_A01` on an A08) never decides the type.
    pub fn classify_message_type(code: &str) -> Self {
        Self::classify(trigger_of(code))
    }

    /// Exact snake_case name, as used in config and JSON.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "admission" => Some(EventType::Admission),
            "discharge" => Some(EventType::Discharge),
            "transfer" => Some(EventType::Transfer),
            "update" => Some(EventType::Update),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Admission => "admission",
            EventType::Discharge => "discharge",
            EventType::Transfer => "transfer",
            EventType::Update => "update",
        }
    }
}

/// Trigger component of a `^`-joined message type; the whole code when there is none.
pub fn trigger_of(code: &str) -> &str {
    match code.split('^').nth(1) {
        Some(trigger) if !trigger.trim().is_empty() => trigger,
        _ => code,
    }
}

/// Normalized, source-agnostic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub patient_id: String,
    pub facility_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl CanonicalEvent {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Size of the serialized payload in bytes.
    pub fn payload_size(&self) -> usize {
        serde_json::to_vec(&self.payload).map(|v| v.len()).unwrap_or(0)
    }
}

/// Deterministic event id: `evt-` + 32 hex chars of
/// `SHA-256(source ␟ facility ␟ control_id ␟ raw)`.
pub fn event_id(source: SourceEncoding, facility_id: &str, control_id: &str, raw: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(source.as_str().as_bytes());
    h.update(FIELD_SEP);
    h.update(facility_id.as_bytes());
    h.update(FIELD_SEP);
    h.update(control_id.as_bytes());
    h.update(FIELD_SEP);
    h.update(raw);
    let digest = h.finalize();
    format!("evt-{}", hex::encode(&digest[..16]))
}

/// Parse an HL7 `YYYYMMDD[HHMM[SS[.S]]][+/-ZZZZ]` or RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let (body, offset) = split_offset(raw)?;
    let digits: String = body.chars().take_while(|c| c.is_ascii_digit()).collect();
    let naive = match digits.len() {
        8 => NaiveDate::parse_from_str(&digits, "%Y%m%d").ok()?.and_hms_opt(0, 0, 0)?,
        12 => NaiveDateTime::parse_from_str(&digits, "%Y%m%d%H%M").ok()?,
        14 => NaiveDateTime::parse_from_str(&digits, "%Y%m%d%H%M%S").ok()?,
        _ => return None,
    };
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

fn split_offset(raw: &str) -> Option<(&str, FixedOffset)> {
    let utc = FixedOffset::east_opt(0)?;
    let Some(pos) = raw.rfind(['+', '-']) else {
        return Some((raw, utc));
    };
    let (body, tz) = raw.split_at(pos);
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hhmm = tz.get(1..)?;
    if hhmm.len() != 4 || !hhmm.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hhmm.get(0..2)?.parse().ok()?;
    let minutes: i32 = hhmm.get(2..4)?.parse().ok()?;
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
    Some((body, offset))
}
