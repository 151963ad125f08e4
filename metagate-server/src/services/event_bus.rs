use std::collections::VecDeque;

use tokio::sync::RwLock;

use crate::models::Event;

/// Bounded in-memory event log with monotonically increasing sequence
/// numbers. When full, the oldest entry is evicted; consumers that poll
/// slower than events arrive observe a gap in sequence numbers but never
/// a duplicate.
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    next_seq: u64,
    entries: VecDeque<(u64, Event)>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            // Sequence numbers start at 1 so cursor 0 means "everything".
            inner: RwLock::new(Inner {
                next_seq: 1,
                entries: VecDeque::new(),
            }),
        }
    }

    /// Appends an event and returns its sequence number.
    pub async fn push(&self, event: Event) -> u64 {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back((seq, event));
        seq
    }

    /// Returns up to `max` events with sequence numbers strictly greater
    /// than `after`, oldest first. Iterating with the last returned
    /// sequence number as the next cursor yields every retained event
    /// exactly once.
    pub async fn pull(&self, after: u64, max: usize) -> Vec<(u64, Event)> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|(seq, _)| *seq > after)
            .take(max)
            .cloned()
            .collect()
    }

    /// Sequence number of the newest retained event, if any.
    pub async fn head(&self) -> Option<u64> {
        let inner = self.inner.read().await;
        inner.entries.back().map(|(seq, _)| *seq)
    }
}
