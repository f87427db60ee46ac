use crate::{
    mlp::{QNet, QNetConfig},
    opt::{Optimizer, OptimizerConfig},
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use std::path::Path;

/// Q-network with its variables and optimizer.
pub struct DqnModel {
    device: Device,
    varmap: VarMap,
    q: QNet,
    opt_config: OptimizerConfig,
    opt: Optimizer,
}

impl DqnModel {
    /// Constructs [`DqnModel`] with freshly initialized variables.
    pub fn build(
        q_config: QNetConfig,
        opt_config: OptimizerConfig,
        device: Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            QNet::build(vb, q_config)?
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            q,
            opt_config,
            opt,
        })
    }

    /// Outputs the action values given a batch of observations.
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        self.q.forward(obs)
    }

    /// Backpropagates the loss and updates the variables.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Replaces the optimizer with a fresh one, discarding its moment estimates.
    pub fn reset_optimizer(&mut self) -> Result<()> {
        self.opt = self.opt_config.build(self.varmap.all_vars())?;
        Ok(())
    }

    /// Variables of the network.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Device of the network.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Saves the variables in safetensors format.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save dqnmodel to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the variables from a safetensors file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load dqnmodel from {:?}", path.as_ref());
        Ok(())
    }
}
