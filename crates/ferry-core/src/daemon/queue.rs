//! Priority-ordered request queue.
//!
//! Stable ordering by `(priority weight, enqueue time, insertion sequence)`:
//! a later high-priority request overtakes earlier normal/low ones, while
//! same-priority requests stay in arrival order.

use chrono::Utc;
use uuid::Uuid;

use super::types::{QueuedRequest, Request};

#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: Vec<QueuedRequest>,
    next_seq: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request at its priority position and return its new id.
    pub fn push(&mut self, request: Request) -> String {
        let entry = QueuedRequest {
            id: Uuid::new_v4().to_string(),
            request,
            enqueued_at: Utc::now(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let id = entry.id.clone();

        let key = Self::sort_key(&entry);
        let position = self
            .entries
            .iter()
            .position(|existing| Self::sort_key(existing) > key)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);

        id
    }

    /// Remove and return the highest-priority entry.
    pub fn pop(&mut self) -> Option<QueuedRequest> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn sort_key(entry: &QueuedRequest) -> (u8, chrono::DateTime<Utc>, u64) {
        (
            entry.request.priority.weight(),
            entry.enqueued_at,
            entry.seq,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::types::Priority;

    #[test]
    fn test_fifo_for_same_priority() {
        let mut queue = RequestQueue::new();
        queue.push(Request::new("first"));
        queue.push(Request::new("second"));
        queue.push(Request::new("third"));

        assert_eq!(queue.pop().unwrap().request.message, "first");
        assert_eq!(queue.pop().unwrap().request.message, "second");
        assert_eq!(queue.pop().unwrap().request.message, "third");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_high_priority_overtakes() {
        let mut queue = RequestQueue::new();
        queue.push(Request::new("low-1").with_priority(Priority::Low));
        queue.push(Request::new("low-2").with_priority(Priority::Low));
        queue.push(Request::new("urgent").with_priority(Priority::High));

        assert_eq!(queue.pop().unwrap().request.message, "urgent");
        assert_eq!(queue.pop().unwrap().request.message, "low-1");
        assert_eq!(queue.pop().unwrap().request.message, "low-2");
    }

    #[test]
    fn test_normal_between_high_and_low() {
        let mut queue = RequestQueue::new();
        queue.push(Request::new("low").with_priority(Priority::Low));
        queue.push(Request::new("normal"));
        queue.push(Request::new("high").with_priority(Priority::High));

        assert_eq!(queue.pop().unwrap().request.message, "high");
        assert_eq!(queue.pop().unwrap().request.message, "normal");
        assert_eq!(queue.pop().unwrap().request.message, "low");
    }

    #[test]
    fn test_ids_are_unique() {
        let mut queue = RequestQueue::new();
        let a = queue.push(Request::new("a"));
        let b = queue.push(Request::new("b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_len_and_clear() {
        let mut queue = RequestQueue::new();
        assert!(queue.is_empty());
        queue.push(Request::new("a"));
        queue.push(Request::new("b"));
        assert_eq!(queue.len(), 2);
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_seq_breaks_equal_timestamp_ties() {
        // Requests enqueued within one clock tick still dequeue in
        // insertion order.
        let mut queue = RequestQueue::new();
        for i in 0..20 {
            queue.push(Request::new(format!("r{i}")));
        }
        for i in 0..20 {
            assert_eq!(queue.pop().unwrap().request.message, format!("r{i}"));
        }
    }
}
