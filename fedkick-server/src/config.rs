//! Configuration of the server.
use anyhow::Result;
use fedkick_core::{soccer::SoccerConfig, Model, ParamSpec, Roster};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    time::Duration,
};

/// Backend of the blob store.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Volatile store, lost on restart.
    Memory,

    /// Files under `root`.
    Fs {
        /// Root directory of the store.
        root: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// Shape and initialization of models created on first access.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ModelInitConfig {
    /// Width of the network input.
    pub obs_dim: usize,

    /// Widths of the hidden layers.
    pub hidden: Vec<usize>,

    /// Number of discrete actions.
    pub n_actions: usize,

    /// Seed of the initial weights.
    pub seed: u64,

    /// Initial weights are drawn from `[-scale, scale)`.
    pub scale: f32,
}

impl Default for ModelInitConfig {
    fn default() -> Self {
        let env = SoccerConfig::default();
        Self {
            obs_dim: env.obs_dim(),
            hidden: vec![128, 128],
            n_actions: env.n_actions(),
            seed: 424_242,
            scale: 0.05,
        }
    }
}

impl ModelInitConfig {
    /// Sets the widths of the hidden layers.
    pub fn hidden(mut self, v: Vec<usize>) -> Self {
        self.hidden = v;
        self
    }

    /// Parameter specs of the network.
    pub fn spec(&self) -> Vec<ParamSpec> {
        Model::dense_spec(self.obs_dim, &self.hidden, self.n_actions)
    }

    /// A model at version 0.
    pub fn init_model(&self) -> Model {
        Model::init(self.spec(), self.seed, self.scale)
    }
}

/// Configuration of the [`Aggregator`](crate::Aggregator).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Scale of the averaged delta added to the model.
    pub lr: f32,

    /// Maximum number of pending deltas consumed by one aggregation.
    pub max_updates: usize,

    /// If set, the server binary aggregates on this interval in milliseconds.
    pub interval_ms: Option<u64>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            lr: 0.1,
            max_updates: 200,
            interval_ms: None,
        }
    }
}

impl AggregatorConfig {
    /// Sets the scale of the averaged delta.
    pub fn lr(mut self, v: f32) -> Self {
        self.lr = v;
        self
    }

    /// Sets the aggregation interval in milliseconds.
    pub fn interval_ms(mut self, v: u64) -> Self {
        self.interval_ms = Some(v);
        self
    }

    /// Aggregation interval, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}

/// Configuration of the server.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: String,

    /// Blob store backend.
    pub store: StoreConfig,

    /// Model shape and initialization.
    pub model: ModelInitConfig,

    /// Aggregation parameters.
    pub aggregator: AggregatorConfig,

    /// The two participants.
    pub roster: Roster,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".into(),
            store: StoreConfig::default(),
            model: ModelInitConfig::default(),
            aggregator: AggregatorConfig::default(),
            roster: Roster::default(),
        }
    }
}

impl ServerConfig {
    /// Constructs [`ServerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ServerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Sets the listen address.
    pub fn addr(mut self, v: impl Into<String>) -> Self {
        self.addr = v.into();
        self
    }

    /// Sets the store backend.
    pub fn store(mut self, v: StoreConfig) -> Self {
        self.store = v;
        self
    }

    /// Sets the model configuration.
    pub fn model(mut self, v: ModelInitConfig) -> Self {
        self.model = v;
        self
    }

    /// Sets the aggregator configuration.
    pub fn aggregator(mut self, v: AggregatorConfig) -> Self {
        self.aggregator = v;
        self
    }
}
