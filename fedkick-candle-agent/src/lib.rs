//! Local learner of fedkick implemented with [candle](https://crates.io/crates/candle-core).
//!
//! [`dqn::Dqn`] implements [`fedkick_core::Learner`] with a double DQN update,
//! an epsilon-greedy policy and export/import of the federated output layer.
pub mod dqn;
pub mod mlp;
pub mod opt;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// Opens the device.
    pub fn build(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}
