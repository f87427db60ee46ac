//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use serde::{Deserialize, Serialize};
use std::default::Default;

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ReplayBufferConfig {
    pub(super) capacity: usize,
    pub(super) seed: u64,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 50_000,
            seed: 42,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed used for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
