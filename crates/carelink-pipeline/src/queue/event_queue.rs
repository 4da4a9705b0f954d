use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use carelink_core::{CanonicalEvent, EventType};

use crate::config::{OverflowPolicy, QueueSection};

/// Transport wrapper around one canonical event.
/// Owned by the queue until dequeued, then by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: String,
    pub event_type: EventType,
    pub payload: CanonicalEvent,
}

impl From<CanonicalEvent> for QueueItem {
    fn from(ev: CanonicalEvent) -> Self {
        Self {
            id: ev.id.clone(),
            event_type: ev.event_type,
            payload: ev,
        }
    }
}

/// Result of `try_enqueue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Id seen before; queue untouched.
    Duplicate,
    /// Queue full under `reject`; id not remembered.
    Rejected,
    /// Accepted after shedding the oldest waiting item (its id is returned).
    Shed(String),
}

impl EnqueueOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EnqueueOutcome::Accepted | EnqueueOutcome::Shed(_))
    }
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    /// Every id ever accepted; survives dequeue.
    seen: HashSet<String>,
}

/// Deduplicating FIFO queue with a capacity bound.
///
/// Dedup check and insert happen under one lock, so concurrent producers
/// cannot both accept the same id.
pub struct EventQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl EventQueue {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: capacity.max(1),
            overflow,
        }
    }

    pub fn from_config(cfg: &QueueSection) -> Self {
        Self::new(cfg.capacity, cfg.overflow)
    }

    // Every mutation leaves the state consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue with full outcome reporting.
    pub fn try_enqueue(&self, item: QueueItem) -> EnqueueOutcome {
        let mut st = self.lock();

        if st.seen.contains(&item.id) {
            return EnqueueOutcome::Duplicate;
        }

        let mut shed = None;
        if st.items.len() >= self.capacity {
            match self.overflow {
                OverflowPolicy::Reject => return EnqueueOutcome::Rejected,
                OverflowPolicy::DropOldest => {
                    shed = st.items.pop_front().map(|old| old.id);
                }
            }
        }

        st.seen.insert(item.id.clone());
        st.items.push_back(item);

        match shed {
            Some(id) => EnqueueOutcome::Shed(id),
            None => EnqueueOutcome::Accepted,
        }
    }

    /// `false` (and no mutation) when the id was seen before or the item was refused.
    pub fn enqueue(&self, item: QueueItem) -> bool {
        self.try_enqueue(item).is_accepted()
    }

    /// Oldest waiting item, if any.
    pub fn dequeue(&self) -> Option<QueueItem> {
        self.lock().items.pop_front()
    }

    /// Dequeue everything, oldest first.
    pub fn drain(&self) -> Vec<QueueItem> {
        self.lock().items.drain(..).collect()
    }

    /// Items awaiting dequeue.
    pub fn size(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Distinct ids ever accepted.
    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.lock().seen.contains(id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
