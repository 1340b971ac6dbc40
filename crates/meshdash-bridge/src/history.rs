//! Bounded, insertion-ordered message history.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use meshdash_shared::constants::HISTORY_CAPACITY;
use meshdash_shared::types::DisplayMessage;

/// Ring of the most recently appended messages. Eviction is by insertion
/// order only; reads never affect what gets evicted.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    messages: VecDeque<DisplayMessage>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, then evict from the front until within capacity.
    pub fn push(&mut self, message: DisplayMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// Copy of the last `n` messages, oldest first.
    pub fn last(&self, n: usize) -> Vec<DisplayMessage> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

/// History shared between its single writer and any number of readers.
/// Readers only ever take copies.
#[derive(Debug, Clone, Default)]
pub struct SharedHistory {
    inner: Arc<RwLock<HistoryBuffer>>,
}

impl SharedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HistoryBuffer::new(capacity))),
        }
    }

    pub(crate) fn push(&self, message: DisplayMessage) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.push(message);
    }

    pub fn last(&self, n: usize) -> Vec<DisplayMessage> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.last(n)
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.contains(id)
    }
}
