//! Pending-request queue in scheduler order.
//!
//! Descending priority; FIFO inside a priority band. Only positioning lives
//! here; whether an insert preempts playback is the controller's call.

use crate::context::TuningState;
use crate::request::{Priority, RequestId, SpeechRequest};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// A request plus its scheduling metadata.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: RequestId,
    pub request: SpeechRequest,
    /// Sanitized text, the form handed to the engine.
    pub text: String,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub tuning: TuningState,
}

impl QueueItem {
    pub fn new(id: RequestId, request: SpeechRequest, text: String, tuning: TuningState) -> Self {
        Self {
            id,
            request,
            text,
            enqueued_at: Utc::now(),
            retry_count: 0,
            tuning,
        }
    }

    pub fn priority(&self) -> Priority {
        self.request.priority
    }
}

#[derive(Debug, Default)]
pub struct PriorityQueue {
    items: VecDeque<QueueItem>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert behind every item of equal or higher priority.
    pub fn insert(&mut self, item: QueueItem) {
        let pos = self
            .items
            .iter()
            .position(|e| e.priority() < item.priority())
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }

    /// Insert ahead of every item with lower priority than Urgent.
    ///
    /// Urgent items already waiting on the same preemption keep their
    /// place, so preempting requests still play in arrival order.
    pub fn insert_preemptive(&mut self, item: QueueItem) {
        let pos = self
            .items
            .iter()
            .position(|e| e.priority() < Priority::Urgent)
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }

    /// Insert at the front of the item's own priority band (retries).
    pub fn insert_front_of_band(&mut self, item: QueueItem) {
        let pos = self
            .items
            .iter()
            .position(|e| e.priority() <= item.priority())
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }

    pub fn pop_head(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    /// Remove a pending item by id.
    pub fn remove(&mut self, id: RequestId) -> Option<QueueItem> {
        let pos = self.items.iter().position(|e| e.id == id)?;
        self.items.remove(pos)
    }

    /// Discard all pending items, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }
}
