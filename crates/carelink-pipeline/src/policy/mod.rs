//! Policy gate (ordered predicate chain).
//!
//! Compiles the declared policy list into a fixed-order chain that the
//! pipeline consults once per dequeued event.

pub mod engine;
pub mod predicates;

pub use engine::{PolicyGate, PolicyResult};
