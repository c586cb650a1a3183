//! Bounded FIFO replay memory

use nemesis_core::Experience;
use rand::Rng;
use std::collections::VecDeque;

/// Fixed-capacity experience buffer with strict FIFO eviction.
///
/// Never persisted; a process restart starts from an empty buffer.
#[derive(Debug)]
pub struct ReplayMemory {
    buf: VecDeque<Experience>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest one at capacity.
    pub fn push(&mut self, record: Experience) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(record);
    }

    /// Draw `batch_size` records independently and uniformly at random,
    /// with replacement. Empty result on an empty buffer; sampling
    /// never removes records.
    pub fn sample<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Vec<Experience> {
        if self.buf.is_empty() {
            return Vec::new();
        }
        (0..batch_size)
            .map(|_| self.buf[rng.random_range(0..self.buf.len())].clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate records oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buf.iter()
    }
}
