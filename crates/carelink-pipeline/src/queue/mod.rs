//! Deduplicating, bounded FIFO of canonical events.

pub mod event_queue;

pub use event_queue::{EnqueueOutcome, EventQueue, QueueItem};
