//! Clipped surrogate loss
use super::rollout::Minibatch;
use crate::model::PpoLosses;
use crate::torch::Categorical;
use tch::{Kind, Tensor};

/// PPO loss terms for a minibatch.
///
/// # Args
/// * `logits`: Policy logits for the minibatch observations, `[B, NUM_ACTIONS]`.
/// * `values`: Value predictions for the minibatch observations, `[B, 1]` or `[B]`.
/// * `batch`: The minibatch samples.
/// * `clip_epsilon`: The probability ratio is clipped to `[1 - eps, 1 + eps]`.
pub fn ppo_losses(
    logits: &Tensor,
    values: &Tensor,
    batch: &Minibatch,
    clip_epsilon: f64,
) -> PpoLosses {
    let distribution = Categorical::new(logits);
    let log_probs = distribution.log_probs(&batch.actions);
    let ratio = (log_probs - &batch.old_log_probs).exp();

    let surrogate = &ratio * &batch.advantages;
    let clipped_surrogate =
        ratio.clamp(1.0 - clip_epsilon, 1.0 + clip_epsilon) * &batch.advantages;
    let policy_loss = -surrogate.min_other(&clipped_surrogate).mean(Kind::Float);

    let value_loss = (&batch.returns - values.reshape(&[-1]))
        .square()
        .mean(Kind::Float);
    let entropy = distribution.entropy().mean(Kind::Float);

    PpoLosses {
        policy_loss,
        value_loss,
        entropy,
    }
}
