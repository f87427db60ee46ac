//! Epsilon-greedy action selection.
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy explorer.
///
/// The exploration rate is given per call; its schedule is owned by the trainer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct EpsilonGreedy {}

impl EpsilonGreedy {
    /// Takes an action based on action values.
    ///
    /// With probability `epsilon` a uniformly random action, otherwise the
    /// index of the first maximum.
    pub fn action(&self, q: &[f32], epsilon: f64, rng: &mut impl Rng) -> usize {
        if rng.gen::<f64>() < epsilon {
            rng.gen_range(0..q.len())
        } else {
            argmax(q)
        }
    }
}

/// Index of the first maximum, 0 for an empty slice.
pub fn argmax(q: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in q.iter().enumerate() {
        if *v > q[best] {
            best = i;
        }
    }
    best
}
