//! DQN agent implemented with candle.
use super::{explorer::EpsilonGreedy, model::DqnModel, DqnConfig};
use crate::util::{
    copy_varmap, set_varmap_from_table, smooth_l1_loss, varmap_to_table, CriticLoss,
};
use anyhow::Result;
use candle_core::{shape::D, Device, Tensor};
use candle_nn::loss::mse;
use fedkick_core::{
    error::FedkickError,
    replay_buffer::{ReplayBuffer, Transition},
    ExperienceBufferBase, Learner, Model, ParamTable, Policy, ReplayBufferBase,
};
use log::{debug, info};
use rand::{rngs::SmallRng, SeedableRng};
use std::{collections::BTreeMap, fs, path::Path};

#[allow(clippy::upper_case_acronyms)]
/// Double DQN agent implemented with candle.
///
/// The agent owns its replay buffer, the online and target networks and the
/// version of the last model snapshot received from the server.
pub struct Dqn {
    qnet: DqnModel,
    qnet_tgt: DqnModel,
    buffer: ReplayBuffer,
    explorer: EpsilonGreedy,
    discount_factor: f64,
    target_sync_interval: usize,
    critic_loss: CriticLoss,
    in_dim: usize,
    n_actions: usize,
    last_layer_prefix: String,
    n_steps: usize,
    version: Option<u64>,
    device: Device,
    rng: SmallRng,
}

impl Dqn {
    /// Constructs DQN agent.
    ///
    /// The target network starts as a copy of the online network.
    pub fn build(config: DqnConfig) -> Result<Self> {
        let device = config.device.build()?;
        let q_config = config.q_config;
        let qnet = DqnModel::build(q_config.clone(), config.opt_config.clone(), device.clone())?;
        let qnet_tgt = DqnModel::build(q_config.clone(), config.opt_config, device.clone())?;
        copy_varmap(qnet_tgt.get_varmap(), qnet.get_varmap())?;

        Ok(Self {
            qnet,
            qnet_tgt,
            buffer: ReplayBuffer::build(&config.replay_buffer_config),
            explorer: EpsilonGreedy::default(),
            discount_factor: config.discount_factor,
            target_sync_interval: config.target_sync_interval.max(1),
            critic_loss: config.critic_loss,
            in_dim: q_config.get_in_dim(),
            n_actions: q_config.get_out_dim(),
            last_layer_prefix: q_config.last_layer_prefix(),
            n_steps: 0,
            version: None,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    fn check_obs(&self, obs: &[f32]) -> Result<(), FedkickError> {
        if obs.len() != self.in_dim {
            return Err(FedkickError::ObsDimMismatch {
                expected: self.in_dim,
                actual: obs.len(),
            });
        }
        Ok(())
    }

    fn stack(&self, rows: impl Iterator<Item = Vec<f32>>, n: usize) -> Result<Tensor> {
        let data: Vec<f32> = rows.flatten().collect();
        Ok(Tensor::from_vec(data, (n, self.in_dim), &self.device)?)
    }

    fn update_critic(&mut self, batch: &[Transition]) -> Result<f32> {
        let n = batch.len();
        for tr in batch.iter() {
            self.check_obs(&tr.state)?;
            self.check_obs(&tr.next_state)?;
        }

        let obs = self.stack(batch.iter().map(|t| t.state.clone()), n)?;
        let next_obs = self.stack(batch.iter().map(|t| t.next_state.clone()), n)?;
        let act = {
            let act: Vec<u32> = batch.iter().map(|t| t.action as u32).collect();
            Tensor::from_vec(act, (n, 1), &self.device)?
        };
        let reward = {
            let reward: Vec<f32> = batch.iter().map(|t| t.reward).collect();
            Tensor::from_vec(reward, (n,), &self.device)?
        };
        let is_not_done = {
            let v: Vec<f32> = batch
                .iter()
                .map(|t| if t.done { 0.0 } else { 1.0 })
                .collect();
            Tensor::from_vec(v, (n,), &self.device)?
        };

        let pred = self
            .qnet
            .forward(&obs)?
            .gather(&act, D::Minus1)?
            .squeeze(D::Minus1)?;

        let tgt = {
            // The online network selects, the target network evaluates.
            let next_act = self.qnet.forward(&next_obs)?.argmax_keepdim(D::Minus1)?;
            let q = self
                .qnet_tgt
                .forward(&next_obs)?
                .gather(&next_act, D::Minus1)?
                .squeeze(D::Minus1)?;
            (reward + ((is_not_done * self.discount_factor)? * q)?)?
        }
        .detach();

        let loss = match self.critic_loss {
            CriticLoss::Mse => mse(&pred, &tgt)?,
            CriticLoss::SmoothL1 => smooth_l1_loss(&pred, &tgt)?,
        };

        self.qnet.backward_step(&loss)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    /// Action values of one observation.
    pub fn q_values(&self, obs: &[f32]) -> Result<Vec<f32>> {
        self.check_obs(obs)?;
        let xs = Tensor::from_slice(obs, (1, self.in_dim), &self.device)?;
        Ok(self.qnet.forward(&xs)?.squeeze(0)?.to_vec1::<f32>()?)
    }

    /// Number of optimization steps counted by [`Learner::maybe_sync_target`].
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Saves the online and target networks in the directory.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        fs::create_dir_all(&path)?;
        self.qnet
            .save(path.as_ref().join("qnet.safetensors").as_path())?;
        self.qnet_tgt
            .save(path.as_ref().join("qnet_tgt.safetensors").as_path())?;
        Ok(())
    }

    /// Loads the online and target networks from the directory.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.qnet
            .load(path.as_ref().join("qnet.safetensors").as_path())?;
        self.qnet_tgt
            .load(path.as_ref().join("qnet_tgt.safetensors").as_path())?;
        Ok(())
    }
}

impl Policy for Dqn {
    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn epsilon_greedy(&mut self, obs: &[f32], epsilon: f64) -> Result<usize> {
        let q = self.q_values(obs)?;
        Ok(self.explorer.action(&q, epsilon, &mut self.rng))
    }
}

impl Learner for Dqn {
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
        self.update_critic(batch)
    }

    fn maybe_sync_target(&mut self) -> Result<()> {
        self.n_steps += 1;
        if self.n_steps % self.target_sync_interval == 0 {
            copy_varmap(self.qnet_tgt.get_varmap(), self.qnet.get_varmap())?;
            debug!("Synchronized target network at step {}", self.n_steps);
        }
        Ok(())
    }

    fn snapshot_last_layer(&self) -> Result<ParamTable> {
        varmap_to_table(self.qnet.get_varmap(), &self.last_layer_prefix)
    }

    fn export_last_layer_delta(&self, before: &ParamTable) -> Result<BTreeMap<String, Vec<f32>>> {
        let after = self.snapshot_last_layer()?;
        Ok(after.diff(before)?)
    }

    fn set_weights_from_server(&mut self, model: &Model) -> Result<()> {
        let table = model.param_table()?;
        set_varmap_from_table(self.qnet.get_varmap(), &table)?;
        set_varmap_from_table(self.qnet_tgt.get_varmap(), &table)?;
        self.qnet.reset_optimizer()?;
        self.version = Some(model.version);
        info!("Applied server model version {}", model.version);
        Ok(())
    }

    fn version(&self) -> Option<u64> {
        self.version
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{mlp::QNetConfig, opt::OptimizerConfig};
    use tempdir::TempDir;

    const IN_DIM: usize = 6;
    const N_ACTIONS: usize = 3;

    fn config() -> DqnConfig {
        DqnConfig::default()
            .q_config(QNetConfig::new(IN_DIM, vec![8, 8], N_ACTIONS))
            .opt_config(OptimizerConfig::Adam { lr: 0.01 })
    }

    fn transition(i: usize, done: bool) -> Transition {
        let state: Vec<f32> = (0..IN_DIM).map(|j| ((i + j) % 5) as f32 * 0.1).collect();
        Transition {
            next_state: state.iter().map(|v| v + 0.05).collect(),
            state,
            action: i % N_ACTIONS,
            reward: if i % 2 == 0 { 1.0 } else { -1.0 },
            done,
        }
    }

    fn server_model(version: u64) -> Model {
        let spec = QNetConfig::new(IN_DIM, vec![8, 8], N_ACTIONS).param_specs();
        let mut model = Model::init(spec, 424242, 0.05);
        model.version = version;
        model
    }

    #[test]
    fn test_loss_decreases_on_fixed_targets() -> Result<()> {
        let mut dqn = Dqn::build(config())?;
        let batch: Vec<Transition> = (0..8).map(|i| transition(i, true)).collect();

        let first = dqn.train_step(&batch)?;
        let mut last = first;
        for _ in 0..200 {
            last = dqn.train_step(&batch)?;
        }
        assert!(last < first, "loss {} did not go below {}", last, first);
        Ok(())
    }

    #[test]
    fn test_wrong_observation_width() -> Result<()> {
        let mut dqn = Dqn::build(config())?;
        assert!(dqn.epsilon_greedy(&[0.0; 5], 0.0).is_err());
        let a = dqn.epsilon_greedy(&[0.0; IN_DIM], 0.0)?;
        assert!(a < N_ACTIONS);
        Ok(())
    }

    #[test]
    fn test_delta_covers_last_layer_only() -> Result<()> {
        let mut dqn = Dqn::build(config())?;
        let before = dqn.snapshot_last_layer()?;
        let names: Vec<&str> = before.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dense_2.bias", "dense_2.weight"]);

        let zero = dqn.export_last_layer_delta(&before)?;
        assert!(zero.values().flatten().all(|v| *v == 0.0));

        let batch: Vec<Transition> = (0..4).map(|i| transition(i, false)).collect();
        dqn.train_step(&batch)?;
        let delta = dqn.export_last_layer_delta(&before)?;
        assert_eq!(delta.len(), 2);
        assert_eq!(delta["dense_2.weight"].len(), N_ACTIONS * 8);
        assert!(delta.values().flatten().any(|v| *v != 0.0));
        Ok(())
    }

    #[test]
    fn test_set_weights_from_server() -> Result<()> {
        let mut dqn = Dqn::build(config())?;
        assert_eq!(dqn.version(), None);

        let model = server_model(3);
        dqn.set_weights_from_server(&model)?;
        assert_eq!(dqn.version(), Some(3));

        let online = varmap_to_table(dqn.qnet.get_varmap(), "")?;
        let target = varmap_to_table(dqn.qnet_tgt.get_varmap(), "")?;
        assert_eq!(online, target);
        for p in online.iter() {
            assert_eq!(p.values, model.weights[&p.name]);
        }

        let mut bad = server_model(4);
        bad.spec[0].shape = vec![8, 5];
        bad.weights.insert("dense_0.weight".to_string(), vec![0.0; 40]);
        assert!(dqn.set_weights_from_server(&bad).is_err());
        Ok(())
    }

    #[test]
    fn test_target_sync_interval() -> Result<()> {
        let mut dqn = Dqn::build(config().target_sync_interval(3))?;
        let batch: Vec<Transition> = (0..4).map(|i| transition(i, false)).collect();
        let target_before = varmap_to_table(dqn.qnet_tgt.get_varmap(), "")?;

        for _ in 0..2 {
            dqn.train_step(&batch)?;
            dqn.maybe_sync_target()?;
        }
        assert_eq!(varmap_to_table(dqn.qnet_tgt.get_varmap(), "")?, target_before);

        dqn.train_step(&batch)?;
        dqn.maybe_sync_target()?;
        assert_eq!(dqn.n_steps(), 3);
        assert_eq!(
            varmap_to_table(dqn.qnet_tgt.get_varmap(), "")?,
            varmap_to_table(dqn.qnet.get_varmap(), "")?
        );
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let mut dqn = Dqn::build(config())?;
        let batch: Vec<Transition> = (0..4).map(|i| transition(i, false)).collect();
        dqn.train_step(&batch)?;

        let dir = TempDir::new("dqn")?;
        dqn.save(dir.path())?;

        let mut dqn_ = Dqn::build(config())?;
        dqn_.load(dir.path())?;
        let obs = transition(1, false).state;
        assert_eq!(dqn.q_values(&obs)?, dqn_.q_values(&obs)?);
        Ok(())
    }

    #[test]
    fn test_replay_through_learner() -> Result<()> {
        let mut dqn = Dqn::build(config())?;
        assert!(dqn.sample_batch(2).is_none());
        dqn.remember(transition(0, false));
        dqn.remember(transition(1, true));
        assert_eq!(dqn.replay_len(), 2);
        assert_eq!(dqn.sample_batch(2).map(|b| b.len()), Some(2));
        Ok(())
    }
}
