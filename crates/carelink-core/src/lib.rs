//! carelink core: source-agnostic message primitives, error types, and the
//! canonical event model.
//!
//! This crate defines the wire-level parsers (HL7 v2, JSON intake), the
//! canonical event record and the normalizer that maps one onto the other.
//! It carries no runtime dependencies so it can be reused by the pipeline,
//! by offline tooling and by tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed clinical input never surfaces as a failure: it degrades to empty
//! fields on the canonical event.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod event;
pub mod normalize;
pub mod protocol;

/// Shared result type.
pub use error::{CarelinkError, ErrorClass, Result};
pub use event::{CanonicalEvent, EventType, RawMessage, SourceEncoding};
pub use normalize::normalize;
