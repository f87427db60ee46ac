//! Multilayer perceptron used as the Q-network.
mod base;
mod config;
pub use base::QNet;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
pub use config::QNetConfig;

fn mlp_forward(xs: Tensor, layers: &[Linear]) -> candle_core::Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs;

    for layer in layers.iter().take(n_layers - 1) {
        xs = layer.forward(&xs)?.relu()?;
    }

    layers[n_layers - 1].forward(&xs)
}
