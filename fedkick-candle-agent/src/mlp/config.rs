use fedkick_core::{soccer::SoccerConfig, Model, ParamSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`QNet`](super::QNet).
pub struct QNetConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
}

impl Default for QNetConfig {
    fn default() -> Self {
        let env = SoccerConfig::default();
        Self {
            in_dim: env.obs_dim(),
            units: vec![128, 128],
            out_dim: env.n_actions(),
        }
    }
}

impl QNetConfig {
    /// Creates configuration of the Q-network.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
        }
    }

    /// Sets the input dimension.
    pub fn in_dim(mut self, v: usize) -> Self {
        self.in_dim = v;
        self
    }

    /// Sets the widths of the hidden layers.
    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    /// Sets the output dimension.
    pub fn out_dim(mut self, v: usize) -> Self {
        self.out_dim = v;
        self
    }

    /// Returns the input dimension.
    pub fn get_in_dim(&self) -> usize {
        self.in_dim
    }

    /// Returns the output dimension.
    pub fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    /// Names and shapes of all parameters of the network.
    pub fn param_specs(&self) -> Vec<ParamSpec> {
        Model::dense_spec(self.in_dim, &self.units, self.out_dim)
    }

    /// Name prefix of the output layer, e.g. `dense_2.`.
    pub fn last_layer_prefix(&self) -> String {
        format!("dense_{}.", self.units.len())
    }
}
