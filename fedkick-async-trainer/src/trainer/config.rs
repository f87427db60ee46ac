use crate::{EpsilonSchedule, PairingConfig, RewardConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Configuration of [`AsyncTrainer`](crate::AsyncTrainer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AsyncTrainerConfig {
    /// Episodes per training iteration.
    pub episodes_per_iteration: usize,

    /// Transitions sampled per participant and iteration.
    pub batch_size: usize,

    /// Optimization steps on the sampled batch per iteration.
    pub local_update_steps: usize,

    /// Interval of uploading queued deltas in milliseconds.
    pub flush_interval_ms: u64,

    /// Interval of fetching server models in milliseconds.
    pub refresh_interval_ms: u64,

    /// Stops after this many iterations; runs until stopped if `None`.
    pub max_iterations: Option<usize>,

    /// Interval of writing status records in iterations.
    pub record_interval: usize,

    /// Exploration schedule.
    pub epsilon: EpsilonSchedule,

    /// Terminal rewards.
    pub rewards: RewardConfig,

    /// Seat assignment.
    pub pairing: PairingConfig,

    /// Seed of episode and pairing randomness.
    pub seed: u64,
}

impl Default for AsyncTrainerConfig {
    fn default() -> Self {
        Self {
            episodes_per_iteration: 8,
            batch_size: 32,
            local_update_steps: 2,
            flush_interval_ms: 15_000,
            refresh_interval_ms: 45_000,
            max_iterations: None,
            record_interval: 1,
            epsilon: EpsilonSchedule::default(),
            rewards: RewardConfig::default(),
            pairing: PairingConfig::default(),
            seed: 42,
        }
    }
}

impl AsyncTrainerConfig {
    /// Constructs [`AsyncTrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`AsyncTrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Sets the number of episodes per iteration.
    pub fn episodes_per_iteration(mut self, v: usize) -> Self {
        self.episodes_per_iteration = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the number of local optimization steps per iteration.
    pub fn local_update_steps(mut self, v: usize) -> Self {
        self.local_update_steps = v;
        self
    }

    /// Sets the flush interval in milliseconds.
    pub fn flush_interval_ms(mut self, v: u64) -> Self {
        self.flush_interval_ms = v;
        self
    }

    /// Sets the refresh interval in milliseconds.
    pub fn refresh_interval_ms(mut self, v: u64) -> Self {
        self.refresh_interval_ms = v;
        self
    }

    /// Sets the maximum number of iterations.
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.max_iterations = Some(v);
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    pub(super) fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub(super) fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_async_trainer_config() -> Result<()> {
        let config = AsyncTrainerConfig::default()
            .episodes_per_iteration(2)
            .max_iterations(10)
            .flush_interval_ms(100);
        let dir = TempDir::new("async_trainer_config")?;
        let path = dir.path().join("config.yaml");
        config.save(&path)?;
        assert_eq!(AsyncTrainerConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_yaml_uses_defaults() -> Result<()> {
        let config: AsyncTrainerConfig = serde_yaml::from_str("batch_size: 16\n")?;
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.episodes_per_iteration, 8);
        assert_eq!(config.flush_interval_ms, 15_000);
        Ok(())
    }
}
