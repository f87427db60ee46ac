//! Local learner.
use super::Policy;
use crate::{replay_buffer::Transition, Model, ParamTable};
use anyhow::Result;
use std::collections::BTreeMap;

/// A trainable policy owning its replay buffer, online and target weights.
///
/// Only the output layer crosses the federation boundary: it is captured with
/// [`Learner::snapshot_last_layer`] before a local training round and the
/// difference is exported with [`Learner::export_last_layer_delta`]. Earlier
/// layers are trained locally only.
pub trait Learner: Policy {
    /// Appends a transition to the replay buffer, evicting the oldest one on overflow.
    fn remember(&mut self, tr: Transition);

    /// Number of transitions in the replay buffer.
    fn replay_len(&self) -> usize;

    /// Draws `size` transitions uniformly with replacement.
    ///
    /// Returns `None` if the replay buffer holds fewer than `size` transitions.
    fn sample_batch(&mut self, size: usize) -> Option<Vec<Transition>>;

    /// Performs one optimization step on the batch and returns the loss.
    fn train_step(&mut self, batch: &[Transition]) -> Result<f32>;

    /// Counts an optimization step and copies the online weights into the
    /// target weights at a fixed interval.
    fn maybe_sync_target(&mut self) -> Result<()>;

    /// Captures the current values of the output layer.
    fn snapshot_last_layer(&self) -> Result<ParamTable>;

    /// Returns `after - before` for every tensor of the output layer.
    fn export_last_layer_delta(&self, before: &ParamTable) -> Result<BTreeMap<String, Vec<f32>>>;

    /// Overwrites both online and target weights with a server snapshot.
    fn set_weights_from_server(&mut self, model: &Model) -> Result<()>;

    /// Version of the last snapshot received from the server.
    fn version(&self) -> Option<u64>;
}
