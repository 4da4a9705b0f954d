//! Evaluation harness: declarative rules checked against a fixed payload.
//!
//! A suite is an ordered list of `(name, rule, expect)` tasks. Each rule is
//! compiled once and evaluated against the payload; any task whose result
//! differs from its expectation fails, and any failure raises the rollback
//! flag used to gate a release.

pub mod harness;
pub mod rule;
pub mod suite;

pub use harness::{EvalHarness, EvalReport, TaskOutcome};
pub use rule::{Comparison, Payload, Rule};
pub use suite::{EvalSuite, EvalTask};
