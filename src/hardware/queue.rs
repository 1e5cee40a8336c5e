//! Bounded event queues for received RF/IR frames

use tracing::debug;

/// Fixed-capacity FIFO; frames arriving while it is full are dropped
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    items: Vec<T>,
    limit: usize,
}

impl<T> EventQueue<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Append a frame; returns false if the queue was full
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() >= self.limit {
            debug!("Event queue full ({}), dropping frame", self.limit);
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
