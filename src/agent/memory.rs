use rand::{seq::index::sample, Rng};
use ringbuffer::{AllocRingBuffer, RingBuffer};

use crate::{gym::Observation, types::Allocation};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub action: Allocation,
    pub reward: f64,
    pub next_observation: Observation,
}

/// Fixed capacity experience store. Once full, every push overwrites the oldest transition.
pub struct ReplayMemory {
    buffer: AllocRingBuffer<Transition>,
}

impl ReplayMemory {
    /// `capacity` must be positive
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: AllocRingBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        self.buffer.push(transition);
    }

    /// Uniformly samples `batch_size` distinct transitions, or `None` while
    /// fewer than that are stored. Separate calls are independent.
    pub fn sample<R: Rng>(&self, rng: &mut R, batch_size: usize) -> Option<Vec<Transition>> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return None;
        }

        sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|index| self.buffer.get(index).copied())
            .collect()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
