use super::{mlp_forward, QNetConfig};
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns vector of linear modules named `dense_0`, `dense_1`, ...
fn create_linear_layers(vs: VarBuilder, config: &QNetConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend_from_slice(&config.units);
    dims.push(config.out_dim);

    let layers = dims
        .windows(2)
        .enumerate()
        .map(|(i, w)| linear(w[0], w[1], vs.pp(format!("dense_{}", i))))
        .collect::<candle_core::Result<Vec<_>>>()?;
    Ok(layers)
}

/// Q-network: dense layers with ReLU in between and a linear output.
pub struct QNet {
    config: QNetConfig,
    device: Device,
    layers: Vec<Linear>,
}

impl QNet {
    /// Creates the layers in the variables of `vs`.
    pub fn build(vs: VarBuilder, config: QNetConfig) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers(vs, &config)?;

        Ok(Self {
            config,
            device,
            layers,
        })
    }

    /// Action values of a batch of observations, shape `[batch, out_dim]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = xs.to_device(&self.device)?;
        Ok(mlp_forward(xs, &self.layers)?)
    }

    /// Configuration of the network.
    pub fn config(&self) -> &QNetConfig {
        &self.config
    }
}
