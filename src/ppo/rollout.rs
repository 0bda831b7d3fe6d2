//! Rollout storage
use super::gae::{gae_returns, normalize_advantages};
use crate::Prng;
use rand::seq::SliceRandom;
use tch::{Device, Kind, Tensor};

/// A shuffled subset of rollout samples, flattened over time and workers.
#[derive(Debug)]
pub struct Minibatch {
    /// One tensor per observation component, each `[B, *component_shape]`.
    pub observations: Vec<Tensor>,
    /// Actions taken, i64 `[B]`.
    pub actions: Tensor,
    /// Log probability of the actions under the rollout policy, `[B]`.
    pub old_log_probs: Tensor,
    /// Value targets, `[B]`.
    pub returns: Tensor,
    /// Advantage estimates, `[B]`.
    pub advantages: Tensor,
}

/// Fixed-size storage for one rollout of `T` steps from `N` workers.
///
/// Observation slot `t` holds the observation the action at step `t` was chosen from;
/// slot `T` holds the observation following the rollout and becomes slot `0` of the next one.
#[derive(Debug)]
pub struct RolloutStorage {
    num_steps: i64,
    num_workers: i64,
    observation_shapes: Vec<Vec<i64>>,
    /// Per component: `[T + 1, N, *shape]`
    observations: Vec<Tensor>,
    /// `[T, N, 1]`
    rewards: Tensor,
    /// `[T + 1, N, 1]`
    value_predictions: Tensor,
    /// `[T + 1, N, 1]`
    returns: Tensor,
    /// `[T, N, 1]`
    old_log_probs: Tensor,
    /// `[T, N]`
    actions: Tensor,
    /// `[T, N, 1]`; zero where the step ended an episode.
    masks: Tensor,
}

impl RolloutStorage {
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(
        observation_shapes: &[Vec<usize>],
        num_steps: usize,
        num_workers: usize,
        device: Device,
    ) -> Self {
        let t = num_steps as i64;
        let n = num_workers as i64;
        let observation_shapes: Vec<Vec<i64>> = observation_shapes
            .iter()
            .map(|shape| shape.iter().map(|&d| d as i64).collect())
            .collect();
        let float = (Kind::Float, device);
        let observations = observation_shapes
            .iter()
            .map(|shape| {
                let full: Vec<i64> = [t + 1, n].iter().chain(shape).copied().collect();
                Tensor::zeros(&full, float)
            })
            .collect();
        Self {
            num_steps: t,
            num_workers: n,
            observation_shapes,
            observations,
            rewards: Tensor::zeros(&[t, n, 1], float),
            value_predictions: Tensor::zeros(&[t + 1, n, 1], float),
            returns: Tensor::zeros(&[t + 1, n, 1], float),
            old_log_probs: Tensor::zeros(&[t, n, 1], float),
            actions: Tensor::zeros(&[t, n], (Kind::Int64, device)),
            masks: Tensor::ones(&[t, n, 1], float),
        }
    }

    /// Number of steps `T` per rollout.
    #[allow(clippy::cast_sign_loss)]
    pub const fn num_steps(&self) -> usize {
        self.num_steps as usize
    }

    /// Observation slot `step` (a view), one tensor per component with shape `[N, *shape]`.
    pub fn observations_at(&self, step: usize) -> Vec<Tensor> {
        let step = step as i64;
        self.observations.iter().map(|obs| obs.get(step)).collect()
    }

    /// Write observation slot `0`.
    pub fn set_initial_observations(&mut self, observations: &[Tensor]) {
        self.write_observations(0, observations);
    }

    fn write_observations(&mut self, slot: i64, observations: &[Tensor]) {
        for (storage, obs) in self.observations.iter().zip(observations) {
            storage.get(slot).copy_(obs);
        }
    }

    /// Store one step.
    ///
    /// # Args
    /// * `step`: Step index `t` in `0 .. T`.
    /// * `next_observations`: Observations after the step, written to slot `t + 1`.
    /// * `actions`: i64 `[N]`.
    /// * `log_probs`: Log probabilities of `actions`, `[N]`.
    /// * `values`: Value predictions of slot `t`, `[N, 1]`.
    /// * `rewards`: `[N]`.
    /// * `masks`: `0` for workers whose episode ended on this step, `1` otherwise, `[N]`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        step: usize,
        next_observations: &[Tensor],
        actions: &Tensor,
        log_probs: &Tensor,
        values: &Tensor,
        rewards: &Tensor,
        masks: &Tensor,
    ) {
        let t = step as i64;
        let column = [self.num_workers, 1];
        self.write_observations(t + 1, next_observations);
        self.actions.get(t).copy_(actions);
        self.old_log_probs.get(t).copy_(&log_probs.reshape(&column));
        self.value_predictions.get(t).copy_(&values.reshape(&column));
        self.rewards.get(t).copy_(&rewards.reshape(&column));
        self.masks.get(t).copy_(&masks.reshape(&column));
    }

    /// Set the value prediction of observation slot `T`.
    pub fn set_bootstrap_value(&mut self, values: &Tensor) {
        self.value_predictions
            .get(self.num_steps)
            .copy_(&values.reshape(&[self.num_workers, 1]));
    }

    /// Compute the discounted returns with generalized advantage estimation.
    pub fn compute_returns(&mut self, gamma: f64, lambda: f64) {
        self.returns = gae_returns(
            &self.rewards,
            &self.value_predictions,
            &self.masks,
            gamma,
            lambda,
        );
    }

    /// Advantages `returns - value_predictions` over the rollout steps, shape `[T, N, 1]`.
    ///
    /// Call after [`compute_returns`](Self::compute_returns).
    pub fn advantages(&self, normalize: bool) -> Tensor {
        let advantages = self.returns.narrow(0, 0, self.num_steps)
            - self.value_predictions.narrow(0, 0, self.num_steps);
        if normalize {
            normalize_advantages(&advantages)
        } else {
            advantages
        }
    }

    /// Shuffle all `T * N` samples and split them into minibatches of `minibatch_size`.
    ///
    /// The last minibatch holds the remainder and may be smaller. No sample is dropped.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn minibatches(
        &self,
        minibatch_size: usize,
        advantages: &Tensor,
        rng: &mut Prng,
    ) -> Vec<Minibatch> {
        let num_samples = self.num_steps * self.num_workers;
        let mut indices: Vec<i64> = (0..num_samples).collect();
        indices.shuffle(rng);

        let device = self.actions.device();
        let flat_observations: Vec<Tensor> = self
            .observations
            .iter()
            .zip(&self.observation_shapes)
            .map(|(obs, shape)| {
                let full: Vec<i64> = [num_samples].iter().chain(shape).copied().collect();
                obs.narrow(0, 0, self.num_steps).reshape(&full)
            })
            .collect();
        let flat_actions = self.actions.reshape(&[num_samples]);
        let flat_log_probs = self.old_log_probs.reshape(&[num_samples]);
        let flat_returns = self
            .returns
            .narrow(0, 0, self.num_steps)
            .reshape(&[num_samples]);
        let flat_advantages = advantages.reshape(&[num_samples]);

        indices
            .chunks(minibatch_size.max(1))
            .map(|chunk| {
                let index = Tensor::of_slice(chunk).to_device(device);
                Minibatch {
                    observations: flat_observations
                        .iter()
                        .map(|obs| obs.index_select(0, &index))
                        .collect(),
                    actions: flat_actions.index_select(0, &index),
                    old_log_probs: flat_log_probs.index_select(0, &index),
                    returns: flat_returns.index_select(0, &index),
                    advantages: flat_advantages.index_select(0, &index),
                }
            })
            .collect()
    }

    /// Carry the final observation over as the first observation of the next rollout.
    pub fn after_update(&mut self) {
        for obs in &self.observations {
            obs.get(0).copy_(&obs.get(self.num_steps));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn filled_storage() -> RolloutStorage {
        // T = 3, N = 2, observation [1] equal to 10 * step + worker
        let mut storage = RolloutStorage::new(&[vec![1]], 3, 2, Device::Cpu);
        storage.set_initial_observations(&[Tensor::of_slice(&[0.0_f32, 1.0]).reshape(&[2, 1])]);
        for step in 0..3 {
            let t = step as f32 + 1.0;
            let next_obs = Tensor::of_slice(&[10.0 * t, 10.0 * t + 1.0]).reshape(&[2, 1]);
            let base = 10 * step as i64;
            storage.insert(
                step,
                &[next_obs],
                &Tensor::of_slice(&[base, base + 1]),
                &Tensor::of_slice(&[-1.0_f32, -2.0]),
                &Tensor::of_slice(&[0.5_f32, 0.5]).reshape(&[2, 1]),
                &Tensor::of_slice(&[1.0_f32, 1.0]),
                &Tensor::of_slice(&[1.0_f32, 1.0]),
            );
        }
        storage.set_bootstrap_value(&Tensor::of_slice(&[0.5_f32, 0.5]));
        storage
    }

    #[test]
    fn insert_writes_next_observation_slot() {
        let storage = filled_storage();
        let last = storage.observations_at(3);
        assert_eq!(Vec::<f32>::from(&last[0].reshape(&[-1])), vec![30.0, 31.0]);
        let first = storage.observations_at(0);
        assert_eq!(Vec::<f32>::from(&first[0].reshape(&[-1])), vec![0.0, 1.0]);
    }

    #[test]
    fn after_update_carries_last_observation() {
        let mut storage = filled_storage();
        storage.after_update();
        let first = storage.observations_at(0);
        assert_eq!(Vec::<f32>::from(&first[0].reshape(&[-1])), vec![30.0, 31.0]);
    }

    #[test]
    fn advantages_subtract_values() {
        let mut storage = filled_storage();
        storage.compute_returns(1.0, 1.0);
        let advantages = storage.advantages(false);
        assert_eq!(advantages.size(), vec![3, 2, 1]);
        // Undiscounted: R_t = (3 - t) + 0.5 and every value is 0.5
        let flat = Vec::<f32>::from(&advantages.reshape(&[-1]));
        assert_eq!(flat, vec![3.0, 3.0, 2.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn minibatches_cover_every_sample_once() {
        let mut storage = filled_storage();
        storage.compute_returns(0.99, 0.95);
        let advantages = storage.advantages(true);
        let mut rng = Prng::seed_from_u64(0);
        let batches = storage.minibatches(4, &advantages, &mut rng);
        let sizes: Vec<i64> = batches.iter().map(|b| b.actions.size()[0]).collect();
        assert_eq!(sizes, vec![4, 2]);

        let mut seen = BTreeSet::new();
        for batch in &batches {
            assert_eq!(batch.observations[0].size()[1], 1);
            let actions = Vec::<i64>::from(&batch.actions);
            let obs = Vec::<f32>::from(&batch.observations[0].reshape(&[-1]));
            for (action, o) in actions.iter().zip(obs) {
                // Observation slot t of worker w is 10 t + w; so was the action
                assert_eq!(*action as f32, o);
                assert!(seen.insert(*action));
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn minibatch_larger_than_rollout() {
        let mut storage = filled_storage();
        storage.compute_returns(0.99, 0.95);
        let advantages = storage.advantages(false);
        let mut rng = Prng::seed_from_u64(1);
        let batches = storage.minibatches(100, &advantages, &mut rng);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].returns.size(), vec![6]);
    }
}
