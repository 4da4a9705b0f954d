//! Pipeline context: queue, policy gate, metrics, sink and dead letters.
//!
//! One `Pipeline` owns all state for one ingestion flow. There is no global
//! state; independent instances can run side by side (tests do exactly that).

use std::sync::Arc;
use std::time::{Duration, Instant};

use carelink_core::error::{CarelinkError, Result};
use carelink_core::{normalize, CanonicalEvent, ErrorClass, RawMessage};

use crate::config::PipelineConfig;
use crate::dispatch::{DeadLetterBox, DownstreamSink};
use crate::obs::{keys, MetricsSink};
use crate::policy::{PolicyGate, PolicyResult};
use crate::queue::{EnqueueOutcome, EventQueue, QueueItem};

/// Result of ingesting one raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub id: String,
    pub outcome: EnqueueOutcome,
}

/// What happened to one dequeued item.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Delivered { id: String },
    Violation { id: String, result: PolicyResult },
    /// Delivery failed or timed out; the item is in the dead-letter box.
    Failed { id: String, class: ErrorClass },
}

/// Tally of one `process_all` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub delivered: usize,
    pub violations: usize,
    pub failed: usize,
}

pub struct Pipeline {
    queue: EventQueue,
    gate: PolicyGate,
    metrics: Arc<MetricsSink>,
    sink: Arc<dyn DownstreamSink>,
    dead_letters: DeadLetterBox,
    timeout: Duration,
}

impl Pipeline {
    /// Build from validated config. Fails only on policy compilation errors.
    pub fn new(cfg: &PipelineConfig, sink: Arc<dyn DownstreamSink>) -> Result<Self> {
        let gate = PolicyGate::new(&cfg.policies)?;

        tracing::info!(
            capacity = cfg.queue.capacity,
            overflow = ?cfg.queue.overflow,
            policies = ?gate.names(),
            sink = sink.name(),
            timeout_ms = cfg.processing.timeout_ms,
            "pipeline ready"
        );

        Ok(Self {
            queue: EventQueue::from_config(&cfg.queue),
            gate,
            metrics: Arc::new(MetricsSink::new()),
            sink,
            dead_letters: DeadLetterBox::new(cfg.processing.dead_letter_capacity),
            timeout: Duration::from_millis(cfg.processing.timeout_ms),
        })
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn gate(&self) -> &PolicyGate {
        &self.gate
    }

    pub fn metrics(&self) -> Arc<MetricsSink> {
        Arc::clone(&self.metrics)
    }

    pub fn dead_letters(&self) -> &DeadLetterBox {
        &self.dead_letters
    }

    /// Normalize and enqueue one raw message.
    pub fn ingest(&self, raw: &RawMessage) -> IngestOutcome {
        let event = normalize(raw);
        let id = event.id.clone();
        let outcome = self.ingest_event(event);
        IngestOutcome { id, outcome }
    }

    /// Enqueue an already-normalized event.
    pub fn ingest_event(&self, event: CanonicalEvent) -> EnqueueOutcome {
        let id = event.id.clone();
        let outcome = self.queue.try_enqueue(QueueItem::from(event));
        match &outcome {
            EnqueueOutcome::Accepted => {
                self.metrics.increment(keys::INGESTED);
                tracing::debug!(event_id = %id, "event queued");
            }
            EnqueueOutcome::Shed(old) => {
                self.metrics.increment(keys::INGESTED);
                self.metrics.increment(keys::SHED);
                tracing::warn!(event_id = %id, shed_id = %old, "queue full; oldest event shed");
            }
            EnqueueOutcome::Duplicate => {
                self.metrics.increment(keys::DUPLICATES);
                tracing::debug!(event_id = %id, "duplicate event ignored");
            }
            EnqueueOutcome::Rejected => {
                self.metrics.increment(keys::REJECTED_FULL);
                tracing::warn!(event_id = %id, capacity = self.queue.capacity(), "queue full; event rejected");
            }
        }
        outcome
    }

    /// Dequeue and process one item; `None` when the queue is empty.
    pub async fn process_next(&self) -> Option<ProcessOutcome> {
        let item = self.queue.dequeue()?;
        let started = Instant::now();
        let outcome = self.process_item(item).await;
        self.metrics.observe_processing(started.elapsed());
        Some(outcome)
    }

    async fn process_item(&self, item: QueueItem) -> ProcessOutcome {
        self.metrics.increment(keys::PROCESSED);

        let result = self.gate.evaluate(&item.payload);
        if !result.allowed {
            self.metrics.increment(keys::VIOLATIONS);
            if let Some(policy) = result.violator() {
                self.metrics.increment(&keys::violation_of(policy));
            }
            tracing::warn!(event_id = %item.id, policy = ?result.violator(), reason = %result.reason, "policy violation");
            return ProcessOutcome::Violation { id: item.id, result };
        }
        self.metrics.increment(keys::ALLOWED);

        let id = item.id.clone();
        match tokio::time::timeout(self.timeout, self.sink.deliver(&item)).await {
            Ok(Ok(())) => {
                self.metrics.increment(keys::DELIVERED);
                ProcessOutcome::Delivered { id }
            }
            Ok(Err(e)) => {
                self.metrics.increment(keys::DELIVERY_FAILED);
                self.dead_letter(item, &e)
            }
            Err(_) => {
                self.metrics.increment(keys::TIMEOUTS);
                let e = CarelinkError::Timeout(self.timeout.as_millis() as u64);
                self.dead_letter(item, &e)
            }
        }
    }

    fn dead_letter(&self, item: QueueItem, e: &CarelinkError) -> ProcessOutcome {
        let id = item.id.clone();
        let class = e.error_class();
        if self.dead_letters.push(item, e.to_string(), class).is_some() {
            self.metrics.increment(keys::DEAD_LETTERS_DROPPED);
        }
        self.metrics.increment(keys::DEAD_LETTERED);
        ProcessOutcome::Failed { id, class }
    }

    /// Drain the queue. Per-item failures are tallied, never fatal.
    pub async fn process_all(&self) -> BatchReport {
        let mut report = BatchReport::default();
        while let Some(outcome) = self.process_next().await {
            report.processed += 1;
            match outcome {
                ProcessOutcome::Delivered { .. } => report.delivered += 1,
                ProcessOutcome::Violation { .. } => report.violations += 1,
                ProcessOutcome::Failed { .. } => report.failed += 1,
            }
        }
        tracing::info!(
            processed = report.processed,
            delivered = report.delivered,
            violations = report.violations,
            failed = report.failed,
            "batch processed"
        );
        report
    }
}
