//! Counter sink for the pipeline.
//!
//! Counters are `AtomicU64`s keyed by name in a `DashMap`, so increments from
//! concurrent callers are each applied exactly once. `snapshot` copies the
//! current values into a sorted map; later increments never show through it.
//! Processing latency goes into a fixed-bucket histogram in microseconds to
//! avoid floating point math.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Well-known counter keys.
pub mod keys {
    pub const INGESTED: &str = "ingested";
    pub const DUPLICATES: &str = "duplicates";
    pub const REJECTED_FULL: &str = "rejected_full";
    pub const SHED: &str = "shed";
    pub const PROCESSED: &str = "processed";
    pub const ALLOWED: &str = "allowed";
    pub const VIOLATIONS: &str = "violations";
    pub const DELIVERED: &str = "delivered";
    pub const DELIVERY_FAILED: &str = "delivery_failed";
    pub const TIMEOUTS: &str = "timeouts";
    pub const DEAD_LETTERED: &str = "dead_lettered";
    pub const DEAD_LETTERS_DROPPED: &str = "dead_letters_dropped";

    /// Per-policy violation counter key.
    pub fn violation_of(policy: &str) -> String {
        format!("{VIOLATIONS}.{policy}")
    }
}

/// Monotonic named counters.
#[derive(Default)]
pub struct MetricsSink {
    counters: DashMap<String, AtomicU64>,
    processing_duration: Histogram,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn increment(&self, key: &str) {
        self.add(key, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, key: &str, v: u64) {
        if let Some(c) = self.counters.get(key) {
            c.fetch_add(v, Ordering::Relaxed);
            return;
        }
        let counter = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value; 0 for keys never incremented.
    pub fn get(&self, key: &str) -> u64 {
        self.counters
            .get(key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect()
    }

    pub fn observe_processing(&self, d: Duration) {
        self.processing_duration.observe(d);
    }

    /// Render in Prometheus text exposition format.
    /// `violations.<policy>` keys become a `policy` label on `carelink_violations_by_policy_total`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let snap = self.snapshot();

        let mut by_policy = Vec::new();
        for (key, val) in &snap {
            match key.split_once('.') {
                Some((keys::VIOLATIONS, policy)) => by_policy.push((policy, *val)),
                _ => {
                    let name = format!("carelink_{}_total", sanitize(key));
                    let _ = writeln!(out, "# TYPE {} counter", name);
                    let _ = writeln!(out, "{} {}", name, val);
                }
            }
        }

        if !by_policy.is_empty() {
            let _ = writeln!(out, "# TYPE carelink_violations_by_policy_total counter");
            for (policy, val) in by_policy {
                let _ = writeln!(
                    out,
                    "carelink_violations_by_policy_total{{policy=\"{}\"}} {}",
                    escape_label(policy),
                    val
                );
            }
        }

        self.processing_duration
            .render("carelink_processing_duration_micros", &mut out);
        out
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

// Fixed Buckets in Microseconds (µs)
// 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s
const BUCKETS_MICROS: [u64; 9] = [100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000];

#[derive(Default)]
struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

impl Histogram {
    fn observe(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(micros, Ordering::Relaxed);

        // Cumulative buckets
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return;
        }
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
            let n = self.buckets[i].load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, le, n);
        }
        let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        let _ = writeln!(out, "{}_sum {}", name, self.sum.load(Ordering::Relaxed));
        let _ = writeln!(out, "{}_count {}", name, count);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;

    use super::*;

    #[test]
    fn snapshot_is_a_copy() {
        let m = MetricsSink::new();
        m.increment(keys::INGESTED);
        let snap = m.snapshot();
        m.increment(keys::INGESTED);
        assert_eq!(snap[keys::INGESTED], 1);
        assert_eq!(m.get(keys::INGESTED), 2);
        assert_eq!(m.get("never"), 0);
    }

    #[test]
    fn snapshots_are_non_decreasing() {
        let m = MetricsSink::new();
        let mut prev = m.snapshot();
        for i in 0..50 {
            m.increment(if i % 2 == 0 { "a" } else { "b" });
            let cur = m.snapshot();
            for (k, v) in &prev {
                assert!(cur[k] >= *v);
            }
            prev = cur;
        }
    }

    #[test]
    fn concurrent_increments_are_exact() {
        let m = Arc::new(MetricsSink::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        m.increment(keys::PROCESSED);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.get(keys::PROCESSED), 8000);
    }

    #[test]
    fn render_prometheus_text() {
        let m = MetricsSink::new();
        m.increment(keys::DELIVERED);
        m.increment(&keys::violation_of("patient_id_present"));
        m.observe_processing(Duration::from_micros(750));
        let out = m.render();
        assert!(out.contains("carelink_delivered_total 1"));
        assert!(out.contains("carelink_violations_by_policy_total{policy=\"patient_id_present\"} 1"));
        assert!(out.contains("carelink_processing_duration_micros_bucket{le=\"1000\"} 1"));
        assert!(out.contains("carelink_processing_duration_micros_bucket{le=\"500\"} 0"));
    }
}
