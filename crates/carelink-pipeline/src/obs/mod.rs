//! In-process metrics.
//!
//! Counters are stored as atomics and can be snapshotted or rendered in
//! Prometheus text format by whatever surface embeds the pipeline.

pub mod metrics;

pub use metrics::{keys, MetricsSink};
