//! Configuration of DQN agent.
use crate::{mlp::QNetConfig, opt::OptimizerConfig, util::CriticLoss, Device};
use anyhow::Result;
use fedkick_core::replay_buffer::ReplayBufferConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn) agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DqnConfig {
    pub(super) q_config: QNetConfig,
    pub(super) opt_config: OptimizerConfig,
    pub(super) discount_factor: f64,
    pub(super) target_sync_interval: usize,
    pub(super) critic_loss: CriticLoss,
    pub(super) replay_buffer_config: ReplayBufferConfig,
    pub(super) device: Device,
    pub(super) seed: u64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            q_config: QNetConfig::default(),
            opt_config: OptimizerConfig::default(),
            discount_factor: 0.99,
            target_sync_interval: 2000,
            critic_loss: CriticLoss::SmoothL1,
            replay_buffer_config: ReplayBufferConfig::default(),
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl DqnConfig {
    /// Sets the configuration of the Q-network.
    pub fn q_config(mut self, v: QNetConfig) -> Self {
        self.q_config = v;
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the number of optimization steps between target synchronizations.
    pub fn target_sync_interval(mut self, v: usize) -> Self {
        self.target_sync_interval = v;
        self
    }

    /// Sets the critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Sets the replay buffer configuration.
    pub fn replay_buffer_config(mut self, v: ReplayBufferConfig) -> Self {
        self.replay_buffer_config = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Sets the seed of exploration.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Configuration of the Q-network.
    pub fn get_q_config(&self) -> &QNetConfig {
        &self.q_config
    }

    /// Seed of weight initialization and exploration.
    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    /// Constructs [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
