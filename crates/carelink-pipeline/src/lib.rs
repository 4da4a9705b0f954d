//! carelink pipeline library entry.
//!
//! This crate wires the queue, policy gate, metrics, downstream delivery and
//! hand-off into one pipeline context, and hosts the independent eval
//! harness. It is consumed by the binary (`main.rs`) and by integration tests.

pub mod config;
pub mod dispatch;
pub mod eval;
pub mod handoff;
pub mod obs;
pub mod pipeline;
pub mod policy;
pub mod queue;

pub use pipeline::{BatchReport, IngestOutcome, Pipeline, ProcessOutcome};
