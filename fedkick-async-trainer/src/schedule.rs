use serde::{Deserialize, Serialize};

/// Linear decay of the exploration rate over trainer iterations.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EpsilonSchedule {
    /// Rate at iteration 0.
    pub eps_start: f64,

    /// Rate from `decay_steps` on.
    pub eps_final: f64,

    /// Number of iterations of the decay.
    pub decay_steps: usize,
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        Self {
            eps_start: 0.2,
            eps_final: 0.05,
            decay_steps: 10_000,
        }
    }
}

impl EpsilonSchedule {
    /// Exploration rate at the given iteration.
    pub fn value(&self, step: usize) -> f64 {
        if step >= self.decay_steps {
            return self.eps_final;
        }
        let progress = step as f64 / self.decay_steps as f64;
        self.eps_start + (self.eps_final - self.eps_start) * progress
    }
}
