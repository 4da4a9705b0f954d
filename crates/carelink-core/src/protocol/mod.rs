//! Source message formats.
//!
//! - HL7 v2: pipe-delimited segments with separators declared in MSH.
//! - JSON intake: a small envelope for producers that already speak JSON.
//!
//! Both parsers are tolerant: malformed input is reported through the parsed
//! structure (absent/empty/malformed markers, `None` on a bad envelope)
//! instead of failing, so one bad message never stops a batch.

pub mod hl7;
pub mod intake;
