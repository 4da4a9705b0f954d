//! Dead letters: allowed events whose delivery failed or timed out.
//!
//! The box is bounded; once full, the oldest entry is evicted with a warning
//! and handed back to the caller so it can be counted.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use carelink_core::ErrorClass;

use crate::queue::QueueItem;

/// A failed delivery with context about why it ended up here.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub item: QueueItem,
    pub reason: String,
    pub class: ErrorClass,
    /// Unix timestamp in milliseconds when the event was dead-lettered.
    pub dead_lettered_at: u64,
}

pub struct DeadLetterBox {
    events: Mutex<VecDeque<DeadLetter>>,
    max_events: usize,
}

impl DeadLetterBox {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_events: max_events.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DeadLetter>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a dead letter; returns the oldest entry if it had to be evicted.
    pub fn push(&self, item: QueueItem, reason: impl Into<String>, class: ErrorClass) -> Option<DeadLetter> {
        let letter = DeadLetter {
            item,
            reason: reason.into(),
            class,
            dead_lettered_at: now_millis(),
        };
        tracing::warn!(
            event_id = %letter.item.id,
            class = letter.class.as_str(),
            reason = %letter.reason,
            "event dead-lettered"
        );

        let mut events = self.lock();
        let evicted = if events.len() >= self.max_events {
            events.pop_front()
        } else {
            None
        };
        events.push_back(letter);
        drop(events);

        if let Some(old) = &evicted {
            tracing::warn!(
                event_id = %old.item.id,
                capacity = self.max_events,
                "dead-letter box full; oldest dead letter dropped"
            );
        }
        evicted
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Most recent first.
    pub fn list(&self, limit: usize) -> Vec<DeadLetter> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Remove and return everything, oldest first, e.g. for replay.
    pub fn take_all(&self) -> Vec<DeadLetter> {
        self.lock().drain(..).collect()
    }
}

impl Default for DeadLetterBox {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
