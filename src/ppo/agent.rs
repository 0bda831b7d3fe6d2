//! Proximal policy optimization agent
use super::bookkeeping::{EpisodeRewards, UpdateRate};
use super::config::{PpoConfig, TrainConfig};
use super::loss::ppo_losses;
use super::rollout::RolloutStorage;
use crate::checkpoint::{checkpoint_path, ensure_parent_dir, BestScore};
use crate::envs::{check_observation_shapes, VecEnvironment, VecStep};
use crate::evaluation::{Actor, Evaluator};
use crate::logging::StatsLogger;
use crate::model::{ActorCriticModel, PpoLosses};
use crate::scheduling::LrScheduler;
use crate::torch::{tensor_from_array, Categorical};
use crate::utils::fmt::{PrettyPrint, Rate};
use crate::{PpoError, Prng};
use log::{debug, info};
use ndarray::ArrayD;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tch::{Device, Tensor};

/// Optional collaborators of [`PpoAgent::train`].
#[derive(Default)]
pub struct TrainHooks<'a> {
    /// Evaluates the agent every `eval_interval` updates.
    pub evaluator: Option<&'a mut dyn Evaluator>,
    /// Adjusts the learning rate from the evaluation score.
    pub lr_scheduler: Option<&'a mut dyn LrScheduler>,
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    /// Number of completed updates.
    pub updates: u64,
    /// Number of rollout steps taken. Each step advances every worker once.
    pub steps: u64,
    /// Best evaluation score, if any was recorded.
    pub best_score: Option<f64>,
    /// Whether training stopped because the learning rate reached 0.
    pub stopped_early: bool,
    /// Mean total reward of each worker's last finished episode.
    pub final_reward_mean: f64,
}

/// Loss values of one minibatch, detached from the graph.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct LossValues {
    policy_loss: f64,
    value_loss: f64,
    entropy: f64,
}

impl From<&PpoLosses> for LossValues {
    fn from(losses: &PpoLosses) -> Self {
        Self {
            policy_loss: f64::from(&losses.policy_loss),
            value_loss: f64::from(&losses.value_loss),
            entropy: f64::from(&losses.entropy),
        }
    }
}

/// Proximal policy optimization agent with a discrete action space.
///
/// Collects rollouts of `t_max` steps from every worker of a vectorized environment
/// and optimizes the clipped surrogate objective of
/// [Schulman et al. (2017)](https://arxiv.org/abs/1707.06347) on them.
#[derive(Debug)]
pub struct PpoAgent<M> {
    model: M,
    config: PpoConfig,
    /// Minibatch shuffling
    rng: Prng,
}

impl<M: ActorCriticModel> PpoAgent<M> {
    pub fn new(model: M, config: PpoConfig, rng: Prng) -> Result<Self, PpoError> {
        config.validate()?;
        Ok(Self { model, config, rng })
    }

    pub const fn config(&self) -> &PpoConfig {
        &self.config
    }

    pub const fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn into_model(self) -> M {
        self.model
    }

    /// Train on a vectorized environment.
    ///
    /// The environment must have `num_workers` workers.
    /// Training statistics are written to `logger` every `log_interval` updates
    /// under the `training` scope.
    pub fn train<V: VecEnvironment + ?Sized>(
        &mut self,
        env: &mut V,
        train_config: &TrainConfig,
        mut hooks: TrainHooks,
        mut logger: &mut dyn StatsLogger,
    ) -> Result<TrainSummary, PpoError> {
        train_config.validate()?;
        let num_workers = self.config.num_workers;
        if env.num_workers() != num_workers {
            return Err(PpoError::WorkerCountMismatch {
                expected: num_workers,
                actual: env.num_workers(),
            });
        }
        let shapes = env.observation_shapes();
        let device = self.model.device();
        let dump_dir = train_config.dump_dir.as_deref();

        let mut storage = RolloutStorage::new(&shapes, self.config.t_max, num_workers, device);
        self.model.set_train_mode(true);
        let initial_observations = env.reset()?;
        check_observation_shapes(&initial_observations, &shapes, &[num_workers])?;
        storage.set_initial_observations(&to_tensors(&initial_observations, device));

        let mut episode_rewards = EpisodeRewards::new(num_workers);
        let mut update_rate = UpdateRate::default();
        let mut best_score = BestScore::new(train_config.high_is_better);
        let steps_per_update = self.config.t_max as u64;
        let mut steps = 0;
        let mut updates = 0;
        let mut stopped_early = false;
        let start = Instant::now();
        let mut last_update = start;

        for i in 1..=train_config.max_updates {
            let now = Instant::now();
            update_rate.push(now - last_update);
            last_update = now;
            debug!(
                "update {} @ {}",
                i % train_config.log_interval,
                Rate(update_rate.updates_per_second())
            );

            self.collect_rollout(env, &mut storage, &shapes, &mut episode_rewards)?;
            steps += steps_per_update;
            let losses = self.optimize(&storage)?;
            storage.after_update();
            updates = i;

            if i % train_config.log_interval == 0 {
                info!(
                    "Updates {}, num timesteps {}, elapsed {}, mean/median reward {:.1}/{:.1}, \
                     entropy {:.5}, value loss {:.5}, policy loss {:.5}",
                    i,
                    steps,
                    PrettyPrint(start.elapsed()),
                    episode_rewards.mean(),
                    episode_rewards.median(),
                    losses.entropy,
                    losses.value_loss,
                    losses.policy_loss,
                );
                let mut scoped = (&mut logger).with_scope("training");
                let mut training_logger = scoped.group();
                training_logger.log_scalar("avg_reward", episode_rewards.mean());
                training_logger.log_scalar("policy_loss", losses.policy_loss);
                training_logger.log_scalar("value_loss", losses.value_loss);
                training_logger.log_scalar("entropy", losses.entropy);
                training_logger.log_scalar("learn_rate", self.model.learning_rate());
                #[allow(clippy::cast_precision_loss)]
                let steps_f64 = steps as f64;
                training_logger.log_scalar("steps", steps_f64);
                training_logger.log_scalar("updates_per_second", update_rate.updates_per_second());
                drop(training_logger);
                logger.flush();
            }

            if i % train_config.eval_interval == 0 {
                if let Some(evaluator) = hooks.evaluator.as_mut() {
                    self.model.set_train_mode(false);
                    let result = evaluator.evaluate(self, &mut *logger, i / train_config.eval_interval);
                    self.model.set_train_mode(true);
                    let stats = result?;

                    if let Some(score_name) = &train_config.score_name {
                        let score = *stats
                            .get(score_name)
                            .ok_or_else(|| PpoError::MissingScore(score_name.clone()))?;

                        if let Some(scheduler) = hooks.lr_scheduler.as_mut() {
                            let current_lr = self.model.learning_rate();
                            let lr = scheduler.step(score, current_lr);
                            if lr != current_lr {
                                self.model.set_learning_rate(lr)?;
                            }
                            // Negative rates are treated as 0
                            if lr <= 0.0 {
                                info!("Training stopped");
                                stopped_early = true;
                                break;
                            }
                        }

                        if best_score.update(score) {
                            info!("New best model at update {}", i);
                            self.store_model("best_model.pt", dump_dir)?;
                        }
                    }
                }
            }

            if i % train_config.dump_interval == 0 {
                info!("Saved model at update {}", i);
                self.store_model(&format!("model_update_{}.pt", i), dump_dir)?;
            }
        }

        Ok(TrainSummary {
            updates,
            steps,
            best_score: best_score.get(),
            stopped_early,
            final_reward_mean: episode_rewards.mean(),
        })
    }

    /// Fill the rollout storage with `t_max` steps from every worker.
    fn collect_rollout<V: VecEnvironment + ?Sized>(
        &mut self,
        env: &mut V,
        storage: &mut RolloutStorage,
        shapes: &[Vec<usize>],
        episode_rewards: &mut EpisodeRewards,
    ) -> Result<(), PpoError> {
        let _no_grad = tch::no_grad_guard();
        let num_workers = self.config.num_workers;
        let device = self.model.device();

        for step in 0..storage.num_steps() {
            let (logits, values) = self.model.forward(&storage.observations_at(step));
            let distribution = Categorical::new(&logits);
            let actions = distribution.sample();
            let log_probs = distribution.log_probs(&actions);

            let action_indices = Vec::<i64>::from(&actions.to_device(Device::Cpu));
            let VecStep {
                observations,
                rewards,
                dones,
            } = env.step(&action_indices)?;
            check_observation_shapes(&observations, shapes, &[num_workers])?;
            if rewards.len() != num_workers || dones.len() != num_workers {
                return Err(PpoError::WorkerCountMismatch {
                    expected: num_workers,
                    actual: rewards.len().min(dones.len()),
                });
            }

            let mask_values: Vec<f32> = dones
                .iter()
                .map(|&done| if done { 0.0 } else { 1.0 })
                .collect();
            let masks = Tensor::of_slice(&mask_values).to_device(device);
            let mut next_observations = to_tensors(&observations, device);
            if self.config.zero_done_observations {
                for obs in &mut next_observations {
                    let mut broadcast_shape = vec![1; obs.dim()];
                    broadcast_shape[0] = -1;
                    *obs = &*obs * masks.reshape(&broadcast_shape);
                }
            }

            storage.insert(
                step,
                &next_observations,
                &actions,
                &log_probs,
                &values,
                &Tensor::of_slice(&rewards).to_device(device),
                &masks,
            );
            episode_rewards.push_step(&rewards, &dones);
        }

        let next_values = self
            .model
            .forward_value(&storage.observations_at(storage.num_steps()));
        storage.set_bootstrap_value(&next_values);
        storage.compute_returns(self.config.gamma, self.config.gae_lambda);
        Ok(())
    }

    /// Optimize the model for `ppo_epochs` passes over the rollout.
    ///
    /// # Returns
    /// The losses of the final minibatch.
    fn optimize(&mut self, storage: &RolloutStorage) -> Result<LossValues, PpoError> {
        let advantages = storage.advantages(self.config.normalize_advantages);
        let mut last_losses = LossValues::default();
        for _ in 0..self.config.ppo_epochs {
            for batch in
                storage.minibatches(self.config.minibatch_size(), &advantages, &mut self.rng)
            {
                let (logits, values) = self.model.forward(&batch.observations);
                let losses = ppo_losses(&logits, &values, &batch, self.config.clip_epsilon);
                self.model.update(&losses)?;
                last_losses = LossValues::from(&losses);
            }
        }
        Ok(last_losses)
    }

    /// Sample an action for a single observation from the current policy.
    pub fn perform_action(&mut self, observation: &[ArrayD<f32>]) -> Result<usize, PpoError> {
        let _no_grad = tch::no_grad_guard();
        let device = self.model.device();
        let batched: Vec<Tensor> = observation
            .iter()
            .map(|obs| tensor_from_array(obs, device).unsqueeze(0))
            .collect();
        let logits = self.model.forward_policy(&batched);
        let action = i64::from(&Categorical::new(&logits).sample().get(0));
        usize::try_from(action).map_err(|_| PpoError::InvalidAction {
            action,
            num_actions: logits.size().last().map_or(0, |&n| n as usize),
        })
    }

    /// Save the model as `name` in `dir` (or the working directory).
    ///
    /// # Returns
    /// The path of the saved model.
    pub fn store_model(&self, name: &str, dir: Option<&Path>) -> Result<PathBuf, PpoError> {
        let path = checkpoint_path(name, dir);
        ensure_parent_dir(&path)?;
        self.model.save(&path)?;
        Ok(path)
    }
}

impl<M: ActorCriticModel> Actor for PpoAgent<M> {
    fn act(&mut self, observation: &[ArrayD<f32>]) -> Result<usize, PpoError> {
        self.perform_action(observation)
    }
}

fn to_tensors(arrays: &[ArrayD<f32>], device: Device) -> Vec<Tensor> {
    arrays
        .iter()
        .map(|array| tensor_from_array(array, device))
        .collect()
}
