//! Actor-critic models
mod mlp;

pub use mlp::{MlpActorCritic, MlpActorCriticConfig};

use crate::PpoError;
use std::path::Path;
use tch::{Device, Tensor};

/// Loss terms of one PPO minibatch.
///
/// Each is a scalar tensor attached to the model's computation graph.
/// How they are weighted and combined is up to the model.
#[derive(Debug)]
pub struct PpoLosses {
    /// Negated clipped surrogate objective.
    pub policy_loss: Tensor,
    /// Mean squared error between returns and value predictions.
    pub value_loss: Tensor,
    /// Mean policy entropy.
    pub entropy: Tensor,
}

/// A policy and value network trained with PPO.
///
/// Observations are passed as one tensor per observation component,
/// each with shape `[BATCH, *component_shape]`.
pub trait ActorCriticModel {
    /// Evaluate the policy and value heads.
    ///
    /// # Returns
    /// * `logits`: Unnormalized action log probabilities with shape `[BATCH, NUM_ACTIONS]`.
    /// * `values`: State value estimates with shape `[BATCH, 1]`.
    fn forward(&self, observations: &[Tensor]) -> (Tensor, Tensor);

    /// Evaluate only the policy head.
    fn forward_policy(&self, observations: &[Tensor]) -> Tensor {
        self.forward(observations).0
    }

    /// Evaluate only the value head.
    fn forward_value(&self, observations: &[Tensor]) -> Tensor {
        self.forward(observations).1
    }

    /// Take one optimization step on the given losses.
    fn update(&mut self, losses: &PpoLosses) -> Result<(), PpoError>;

    /// Current optimizer learning rate.
    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, learning_rate: f64) -> Result<(), PpoError>;

    /// Switch between training and evaluation mode.
    fn set_train_mode(&mut self, train: bool);

    /// Device on which the model parameters live.
    fn device(&self) -> Device;

    /// Save the model parameters.
    fn save(&self, path: &Path) -> Result<(), PpoError>;
}

impl<M: ActorCriticModel + ?Sized> ActorCriticModel for Box<M> {
    fn forward(&self, observations: &[Tensor]) -> (Tensor, Tensor) {
        M::forward(self, observations)
    }
    fn forward_policy(&self, observations: &[Tensor]) -> Tensor {
        M::forward_policy(self, observations)
    }
    fn forward_value(&self, observations: &[Tensor]) -> Tensor {
        M::forward_value(self, observations)
    }
    fn update(&mut self, losses: &PpoLosses) -> Result<(), PpoError> {
        M::update(self, losses)
    }
    fn learning_rate(&self) -> f64 {
        M::learning_rate(self)
    }
    fn set_learning_rate(&mut self, learning_rate: f64) -> Result<(), PpoError> {
        M::set_learning_rate(self, learning_rate)
    }
    fn set_train_mode(&mut self, train: bool) {
        M::set_train_mode(self, train)
    }
    fn device(&self) -> Device {
        M::device(self)
    }
    fn save(&self, path: &Path) -> Result<(), PpoError> {
        M::save(self, path)
    }
}
