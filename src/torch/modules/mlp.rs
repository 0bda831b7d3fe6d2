//! Multi-layer perceptron
use super::Activation;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::nn::{self, Linear, Module, Path};
use tch::Tensor;

/// Configuration for the [`Mlp`] module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Sizes of the hidden layers
    pub hidden_sizes: Vec<usize>,
    /// Activation function between hidden layers.
    pub activation: Activation,
    /// Activation function on the output.
    pub output_activation: Activation,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64, 64],
            activation: Activation::Tanh,
            output_activation: Activation::Identity,
        }
    }
}

impl MlpConfig {
    pub fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Mlp {
        Mlp::new(vs, in_dim, out_dim, self)
    }
}

/// Multi-layer perceptron
#[derive(Debug)]
pub struct Mlp {
    layers: Vec<Linear>,
    activation: Activation,
    output_activation: Activation,
}

impl Mlp {
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &MlpConfig) -> Self {
        let in_dims = iter::once(&in_dim).chain(&config.hidden_sizes);
        let out_dims = config.hidden_sizes.iter().chain(iter::once(&out_dim));

        let layers: Vec<_> = in_dims
            .zip(out_dims)
            .enumerate()
            .map(|(i, (in_, out_))| {
                nn::linear(
                    vs / format!("layer_{}", i),
                    *in_ as i64,
                    *out_ as i64,
                    Default::default(),
                )
            })
            .collect();

        Self {
            layers,
            activation: config.activation,
            output_activation: config.output_activation,
        }
    }

    /// Number of linear layers (hidden layers + 1).
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl Module for Mlp {
    fn forward(&self, input: &Tensor) -> Tensor {
        let (first, rest) = self
            .layers
            .split_first()
            .expect("must have >= 1 layers by construction");
        let mut hidden = first.forward(input);
        for layer in rest {
            hidden = layer.forward(&self.activation.forward_owned(hidden));
        }
        self.output_activation.forward_owned(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn forward_batch_shape() {
        let vs = VarStore::new(Device::Cpu);
        let mlp = MlpConfig::default().build_module(&vs.root(), 3, 2);
        assert_eq!(mlp.num_layers(), 3);
        let output = mlp.forward(&Tensor::ones(&[4, 3], (Kind::Float, Device::Cpu)));
        assert_eq!(output.size(), vec![4, 2]);
    }

    #[test]
    fn no_hidden_layers_is_linear() {
        let vs = VarStore::new(Device::Cpu);
        let config = MlpConfig {
            hidden_sizes: vec![],
            ..MlpConfig::default()
        };
        let mlp = config.build_module(&vs.root(), 5, 1);
        assert_eq!(mlp.num_layers(), 1);
        assert_eq!(vs.trainable_variables().len(), 2);
    }
}
