//! Simple FIFO replay buffer.
use super::{ReplayBufferConfig, Transition};
use crate::{ExperienceBufferBase, ReplayBufferBase};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;

/// A bounded replay buffer.
///
/// Insertion appends; once `capacity` is reached the oldest transition is
/// evicted. Sampling draws uniformly with replacement.
pub struct ReplayBuffer {
    capacity: usize,
    items: VecDeque<Transition>,
    rng: StdRng,
}

impl ReplayBuffer {
    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over the stored transitions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.items.iter()
    }

    /// Removes every stored transition.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl ExperienceBufferBase for ReplayBuffer {
    type Item = Transition;

    fn push(&mut self, tr: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(tr);
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl ReplayBufferBase for ReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = Vec<Transition>;

    fn build(config: &Self::Config) -> Self {
        Self {
            capacity: config.capacity,
            items: VecDeque::with_capacity(config.capacity.min(4096)),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn batch(&mut self, size: usize) -> Option<Self::Batch> {
        let n = self.items.len();
        if n < size || n == 0 {
            return None;
        }
        let batch = (0..size)
            .map(|_| self.items[self.rng.gen_range(0..n)].clone())
            .collect();
        Some(batch)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tr(i: usize) -> Transition {
        Transition {
            state: vec![i as f32],
            action: i % 10,
            next_state: vec![i as f32 + 1.0],
            reward: 0.0,
            done: false,
        }
    }

    fn buffer(capacity: usize) -> ReplayBuffer {
        ReplayBuffer::build(&ReplayBufferConfig::default().capacity(capacity))
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut buf = buffer(7);
        for i in 0..50 {
            buf.push(tr(i));
            assert!(buf.len() <= 7);
        }
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn test_overflow_keeps_most_recent_in_order() {
        let mut buf = buffer(5);
        for i in 0..12 {
            buf.push(tr(i));
        }
        let kept: Vec<usize> = buf.iter().map(|t| t.state[0] as usize).collect();
        assert_eq!(kept, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_batch_requires_enough_transitions() {
        let mut buf = buffer(100);
        for i in 0..3 {
            buf.push(tr(i));
        }
        assert!(buf.batch(4).is_none());
        let batch = buf.batch(3).unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_batch_samples_with_replacement() {
        let mut buf = buffer(100);
        buf.push(tr(1));
        buf.push(tr(2));
        let has_duplicate = (0..100).any(|_| {
            let batch = buf.batch(2).unwrap();
            batch[0] == batch[1]
        });
        assert!(has_duplicate);
    }

    #[test]
    fn test_batch_draws_only_stored_items() {
        let mut buf = buffer(4);
        for i in 0..10 {
            buf.push(tr(i));
        }
        let batch = buf.batch(4).unwrap();
        for t in batch {
            assert!((6..10).contains(&(t.state[0] as usize)));
        }
    }
}
