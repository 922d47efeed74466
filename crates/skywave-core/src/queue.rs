//! Bounded single-producer/single-consumer IQ chunk queue (spec §4.B).
//!
//! Drop-newest-on-full: spec §9 resolves the reference's "drop oldest"
//! doc comment against its actual drop-newest implementation in favor of
//! the latter, since it is the simpler SPSC-compatible contract.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct IqQueue {
    inner: Mutex<VecDeque<Bytes>>,
    capacity: usize,
}

impl IqQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Pushes a chunk. Returns `true` if it was accepted, `false` if the
    /// queue was full and the chunk was dropped.
    pub fn try_push(&self, chunk: Bytes) -> bool {
        let mut q = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if q.len() >= self.capacity {
            return false;
        }
        q.push_back(chunk);
        true
    }

    pub fn pop(&self) -> Option<Bytes> {
        let mut q = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        q.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards every pending chunk. Used by the scanner to drain stale
    /// samples across a retune before trusting the next signal measurement
    /// (spec §5 ordering guarantees).
    pub fn drain(&self) {
        let mut q = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        q.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_retains_oldest_twenty_and_drops_the_rest() {
        let q = IqQueue::new(20);
        let mut accepted = 0;
        for i in 0..25u8 {
            if q.try_push(Bytes::from(vec![i])) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 20);
        assert_eq!(q.len(), 20);
        for expected in 0..20u8 {
            assert_eq!(q.pop().unwrap()[0], expected);
        }
        assert!(q.pop().is_none());
    }

    #[test]
    fn drain_empties_queue() {
        let q = IqQueue::new(4);
        q.try_push(Bytes::from_static(b"a"));
        q.try_push(Bytes::from_static(b"b"));
        q.drain();
        assert!(q.is_empty());
    }
}
