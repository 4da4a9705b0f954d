//! JSON test vector loader shared by normalizer tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde::Deserialize;

use carelink_core::{RawMessage, SourceEncoding};

#[derive(Debug, Deserialize)]
pub struct TestVector {
    pub description: String,
    pub message: MessageData,
    pub expect: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct MessageData {
    pub encoding: String,
    /// Segments, joined with `\r` for HL7; a single document for JSON.
    pub lines: Vec<String>,
}

impl MessageData {
    pub fn raw(&self) -> RawMessage {
        match self.encoding.as_str() {
            "hl7v2" => RawMessage::new(SourceEncoding::Hl7v2, self.lines.join("\r")),
            "json" => RawMessage::new(SourceEncoding::Json, self.lines.join("\n")),
            other => panic!("unsupported encoding: {other}"),
        }
    }
}
