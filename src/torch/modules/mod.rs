//! Neural network modules
mod mlp;

pub use mlp::{Mlp, MlpConfig};

use serde::{Deserialize, Serialize};
use tch::Tensor;

/// Activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// No transformation
    Identity,
    /// Rectified linear
    Relu,
    /// Sigmoid function
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Default for Activation {
    #[inline]
    fn default() -> Self {
        Self::Tanh
    }
}

impl Activation {
    /// Apply to an owned tensor
    #[inline]
    pub fn forward_owned(self, tensor: Tensor) -> Tensor {
        match self {
            Self::Identity => tensor,
            Self::Relu => tensor.relu(),
            Self::Sigmoid => tensor.sigmoid(),
            Self::Tanh => tensor.tanh(),
        }
    }
}
