//! Multi-layer perceptron actor-critic
use super::{ActorCriticModel, PpoLosses};
use crate::torch::modules::{Activation, Mlp, MlpConfig};
use crate::torch::optimizers::{clip_grad_norm, AdamConfig};
use crate::torch::serialize::DeviceDef;
use crate::PpoError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tch::nn::{self, Linear, Module, VarStore};
use tch::{COptimizer, Device, Tensor};

/// Configuration for [`MlpActorCritic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpActorCriticConfig {
    /// Sizes of the shared hidden layers.
    pub hidden_sizes: Vec<usize>,
    /// Activation function applied after every hidden layer.
    pub activation: Activation,
    /// Optimizer configuration.
    pub optimizer: AdamConfig,
    /// Weight of the value loss in the combined loss.
    pub value_loss_coef: f64,
    /// Weight of the entropy bonus in the combined loss.
    pub entropy_coef: f64,
    /// Clip the global gradient norm to this value, if set.
    pub max_grad_norm: Option<f64>,
    /// Device on which to store the parameters.
    #[serde(with = "DeviceDef")]
    pub device: Device,
}

impl Default for MlpActorCriticConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64, 64],
            activation: Activation::Tanh,
            optimizer: AdamConfig::default(),
            value_loss_coef: 0.5,
            entropy_coef: 0.01,
            max_grad_norm: Some(0.5),
            device: Device::Cpu,
        }
    }
}

impl MlpActorCriticConfig {
    /// Build a model for the given observation component shapes and number of actions.
    #[allow(clippy::cast_possible_wrap)]
    pub fn build(
        &self,
        observation_shapes: &[Vec<usize>],
        num_actions: usize,
    ) -> Result<MlpActorCritic, PpoError> {
        if num_actions == 0 {
            return Err(PpoError::InvalidConfig(
                "model must have at least one action".into(),
            ));
        }
        if self.hidden_sizes.contains(&0) {
            return Err(PpoError::InvalidConfig(
                "hidden layer sizes must be positive".into(),
            ));
        }
        let input_dim: usize = observation_shapes
            .iter()
            .map(|shape| shape.iter().product::<usize>())
            .sum();
        if input_dim == 0 {
            return Err(PpoError::InvalidConfig("observations are empty".into()));
        }

        let vs = VarStore::new(self.device);
        let root = vs.root();
        let (trunk, feature_dim) = match self.hidden_sizes.split_last() {
            Some((&last, inner)) => {
                let trunk_config = MlpConfig {
                    hidden_sizes: inner.to_vec(),
                    activation: self.activation,
                    output_activation: self.activation,
                };
                let trunk = trunk_config.build_module(&(&root / "trunk"), input_dim, last);
                (Some(trunk), last)
            }
            None => (None, input_dim),
        };
        let policy_head = nn::linear(
            &root / "policy",
            feature_dim as i64,
            num_actions as i64,
            Default::default(),
        );
        let value_head = nn::linear(&root / "value", feature_dim as i64, 1, Default::default());
        let optimizer = self.optimizer.build_optimizer(&vs)?;
        debug!(
            "built actor-critic with input {}, features {}, {} actions",
            input_dim, feature_dim, num_actions
        );

        Ok(MlpActorCritic {
            vs,
            trunk,
            policy_head,
            value_head,
            optimizer,
            learning_rate: self.optimizer.learning_rate,
            value_loss_coef: self.value_loss_coef,
            entropy_coef: self.entropy_coef,
            max_grad_norm: self.max_grad_norm,
            train: true,
        })
    }
}

/// Actor-critic with a shared MLP trunk and linear policy and value heads.
///
/// Observation components are flattened and concatenated to form the trunk input.
pub struct MlpActorCritic {
    vs: VarStore,
    trunk: Option<Mlp>,
    policy_head: Linear,
    value_head: Linear,
    optimizer: COptimizer,
    learning_rate: f64,
    value_loss_coef: f64,
    entropy_coef: f64,
    max_grad_norm: Option<f64>,
    /// No layer behaves differently in evaluation; tracked for callers.
    train: bool,
}

impl fmt::Debug for MlpActorCritic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MlpActorCritic")
            .field("trunk", &self.trunk)
            .field("policy_head", &self.policy_head)
            .field("value_head", &self.value_head)
            .field("learning_rate", &self.learning_rate)
            .field("value_loss_coef", &self.value_loss_coef)
            .field("entropy_coef", &self.entropy_coef)
            .field("max_grad_norm", &self.max_grad_norm)
            .field("train", &self.train)
            .finish()
    }
}

impl MlpActorCritic {
    pub const fn is_training(&self) -> bool {
        self.train
    }

    /// Shared features with shape `[BATCH, FEATURES]`.
    fn features(&self, observations: &[Tensor]) -> Tensor {
        let flat: Vec<Tensor> = observations
            .iter()
            .map(|obs| obs.reshape(&[obs.size()[0], -1]))
            .collect();
        let input = Tensor::cat(&flat, 1).to_device(self.vs.device());
        match &self.trunk {
            Some(trunk) => trunk.forward(&input),
            None => input,
        }
    }
}

impl ActorCriticModel for MlpActorCritic {
    fn forward(&self, observations: &[Tensor]) -> (Tensor, Tensor) {
        let features = self.features(observations);
        (
            self.policy_head.forward(&features),
            self.value_head.forward(&features),
        )
    }

    fn forward_policy(&self, observations: &[Tensor]) -> Tensor {
        self.policy_head.forward(&self.features(observations))
    }

    fn forward_value(&self, observations: &[Tensor]) -> Tensor {
        self.value_head.forward(&self.features(observations))
    }

    fn update(&mut self, losses: &PpoLosses) -> Result<(), PpoError> {
        let loss = &losses.policy_loss + &losses.value_loss * self.value_loss_coef
            - &losses.entropy * self.entropy_coef;
        self.optimizer.zero_grad()?;
        loss.backward();
        if let Some(max_norm) = self.max_grad_norm {
            clip_grad_norm(&self.vs.trainable_variables(), max_norm);
        }
        self.optimizer.step()?;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f64) -> Result<(), PpoError> {
        self.optimizer.set_learning_rate(learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(())
    }

    fn set_train_mode(&mut self, train: bool) {
        self.train = train;
    }

    fn device(&self) -> Device {
        self.vs.device()
    }

    fn save(&self, path: &Path) -> Result<(), PpoError> {
        self.vs.save(path)?;
        Ok(())
    }
}
