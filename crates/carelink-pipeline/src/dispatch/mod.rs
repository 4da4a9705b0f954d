//! Downstream delivery.
//!
//! Re-exports the sink trait, the built-in sinks and the dead-letter box so
//! downstream consumers can depend on this module directly.

pub mod dead_letter;
pub mod sink;

pub use dead_letter::{DeadLetter, DeadLetterBox};
pub use sink::{DownstreamSink, HandoffSink, LogSink, MemorySink};
