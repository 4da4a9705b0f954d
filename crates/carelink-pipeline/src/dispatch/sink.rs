use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use carelink_core::error::{CarelinkError, Result};

use crate::handoff::{self, CancelToken};
use crate::queue::QueueItem;

/// Consumer of allowed events. Called once per event, under the pipeline's
/// processing deadline.
#[async_trait]
pub trait DownstreamSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, item: &QueueItem) -> Result<()>;
}

/// Logs each delivery; the default when no hand-off is configured.
#[derive(Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DownstreamSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, item: &QueueItem) -> Result<()> {
        tracing::info!(
            event_id = %item.id,
            event_type = item.event_type.as_str(),
            patient_id = %item.payload.patient_id,
            facility_id = %item.payload.facility_id,
            "event delivered"
        );
        Ok(())
    }
}

/// Keeps delivered items in memory, in delivery order.
#[derive(Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<QueueItem>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<QueueItem> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered().into_iter().map(|i| i.id).collect()
    }
}

#[async_trait]
impl DownstreamSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, item: &QueueItem) -> Result<()> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.clone());
        Ok(())
    }
}

/// Writes each delivered event to the well-known hand-off path (last one wins).
pub struct HandoffSink {
    path: PathBuf,
}

impl HandoffSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DownstreamSink for HandoffSink {
    fn name(&self) -> &'static str {
        "handoff"
    }

    async fn deliver(&self, item: &QueueItem) -> Result<()> {
        let path = self.path.clone();
        let event = item.payload.clone();
        let token = Arc::new(CancelToken::new());
        // Dropping this future (deadline hit) cancels the blocking write.
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&token));

        let committed = tokio::task::spawn_blocking(move || handoff::write_event_unless(&path, &event, &token))
            .await
            .map_err(|e| CarelinkError::Internal(format!("handoff task failed: {e}")))??;
        if !committed {
            return Err(CarelinkError::Internal("hand-off cancelled before commit".into()));
        }
        tracing::debug!(event_id = %item.id, path = %self.path.display(), "event handed off");
        Ok(())
    }
}

struct CancelOnDrop(Arc<CancelToken>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
