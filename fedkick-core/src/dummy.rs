//! A learner without a neural network, used in tests of the trainer and the server.
//!
//! It keeps a real replay buffer and an output layer whose values move by a
//! fixed amount per training step, which is enough to produce non-zero deltas.
use crate::{
    error::FedkickError,
    replay_buffer::{ReplayBuffer, ReplayBufferConfig, Transition},
    ExperienceBufferBase, Learner, Model, NamedParam, ParamTable, Policy, ReplayBufferBase,
};
use anyhow::Result;
use std::collections::BTreeMap;

/// Learner whose "training" adds `step_size` to each output-layer value.
pub struct DummyLearner {
    n_actions: usize,
    prefix: String,
    step_size: f32,
    last_layer: ParamTable,
    target: ParamTable,
    buffer: ReplayBuffer,
    rng: fastrand::Rng,
    version: Option<u64>,
    n_steps: usize,
    sync_interval: usize,
    n_syncs: usize,
    n_train_steps: usize,
}

impl DummyLearner {
    /// Creates a learner whose output layer matches the last two entries of
    /// [`Model::dense_spec`]`(in_dim, hidden, n_actions)`.
    pub fn new(in_dim: usize, hidden: &[usize], n_actions: usize) -> Self {
        let spec = Model::dense_spec(in_dim, hidden, n_actions);
        let prefix = format!("dense_{}.", hidden.len());
        let mut last_layer = ParamTable::default();
        for p in spec.into_iter().filter(|p| p.name.starts_with(&prefix)) {
            let values = vec![0f32; p.numel()];
            // Lengths match the shapes by construction.
            if let Ok(p) = NamedParam::new(p.name, p.shape, values) {
                last_layer.push(p);
            }
        }
        Self {
            n_actions,
            prefix,
            step_size: 0.01,
            target: last_layer.clone(),
            last_layer,
            buffer: ReplayBuffer::build(&ReplayBufferConfig::default()),
            rng: fastrand::Rng::with_seed(0),
            version: None,
            n_steps: 0,
            sync_interval: 2000,
            n_syncs: 0,
            n_train_steps: 0,
        }
    }

    /// Sets the amount added per training step.
    pub fn step_size(mut self, v: f32) -> Self {
        self.step_size = v;
        self
    }

    /// Sets the interval of target synchronization.
    pub fn sync_interval(mut self, v: usize) -> Self {
        self.sync_interval = v;
        self
    }

    /// Number of calls to [`Learner::train_step`].
    pub fn n_train_steps(&self) -> usize {
        self.n_train_steps
    }

    /// Number of target synchronizations.
    pub fn n_syncs(&self) -> usize {
        self.n_syncs
    }

    /// Current output layer.
    pub fn last_layer(&self) -> &ParamTable {
        &self.last_layer
    }
}

impl Policy for DummyLearner {
    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn epsilon_greedy(&mut self, obs: &[f32], epsilon: f64) -> Result<usize> {
        if obs.is_empty() {
            return Err(FedkickError::ObsDimMismatch {
                expected: 1,
                actual: 0,
            }
            .into());
        }
        if self.rng.f64() < epsilon {
            Ok(self.rng.usize(..self.n_actions))
        } else {
            Ok(0)
        }
    }
}

impl Learner for DummyLearner {
    fn remember(&mut self, tr: Transition) {
        self.buffer.push(tr);
    }

    fn replay_len(&self) -> usize {
        self.buffer.len()
    }

    fn sample_batch(&mut self, size: usize) -> Option<Vec<Transition>> {
        self.buffer.batch(size)
    }

    fn train_step(&mut self, batch: &[Transition]) -> Result<f32> {
        let step = self.step_size;
        let names: Vec<String> = self.last_layer.iter().map(|p| p.name.clone()).collect();
        for name in names.iter() {
            if let Some(p) = self.last_layer.get_mut(name) {
                p.values.iter_mut().for_each(|v| *v += step);
            }
        }
        self.n_train_steps += 1;
        let loss = batch.iter().map(|t| t.reward.abs()).sum::<f32>() / batch.len().max(1) as f32;
        Ok(loss)
    }

    fn maybe_sync_target(&mut self) -> Result<()> {
        self.n_steps += 1;
        if self.n_steps % self.sync_interval == 0 {
            self.target = self.last_layer.clone();
            self.n_syncs += 1;
        }
        Ok(())
    }

    fn snapshot_last_layer(&self) -> Result<ParamTable> {
        Ok(self.last_layer.clone())
    }

    fn export_last_layer_delta(&self, before: &ParamTable) -> Result<BTreeMap<String, Vec<f32>>> {
        Ok(self.last_layer.diff(before)?)
    }

    fn set_weights_from_server(&mut self, model: &Model) -> Result<()> {
        let table = model.param_table()?;
        for p in table.iter().filter(|p| p.name.starts_with(&self.prefix)) {
            self.last_layer.push(p.clone());
        }
        self.target = self.last_layer.clone();
        self.version = Some(model.version);
        Ok(())
    }

    fn version(&self) -> Option<u64> {
        self.version
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_delta_follows_training() -> Result<()> {
        let mut learner = DummyLearner::new(4, &[3], 2).step_size(0.5);
        let before = learner.snapshot_last_layer()?;
        learner.train_step(&[])?;
        learner.train_step(&[])?;
        let delta = learner.export_last_layer_delta(&before)?;
        assert_eq!(delta.len(), 2);
        assert_eq!(delta["dense_1.weight"], vec![1.0; 6]);
        Ok(())
    }

    #[test]
    fn test_set_weights_from_server() -> Result<()> {
        let mut learner = DummyLearner::new(4, &[3], 2);
        assert_eq!(learner.version(), None);
        let mut model = Model::init(Model::dense_spec(4, &[3], 2), 1, 0.05);
        model.version = 5;
        learner.set_weights_from_server(&model)?;
        assert_eq!(learner.version(), Some(5));
        assert_eq!(
            learner.last_layer().get("dense_1.bias").unwrap().values,
            model.weights["dense_1.bias"]
        );
        Ok(())
    }
}
