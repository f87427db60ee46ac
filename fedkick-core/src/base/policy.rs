//! Policy.
use anyhow::Result;

/// A policy on the soccer environment.
///
/// Policy is a mapping from an observation to a discrete action index.
pub trait Policy {
    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Samples an action given an observation.
    ///
    /// With probability `epsilon` a uniformly random action is taken,
    /// otherwise the action with the highest estimated value.
    fn epsilon_greedy(&mut self, obs: &[f32], epsilon: f64) -> Result<usize>;
}
