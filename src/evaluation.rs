//! Policy evaluation
use crate::envs::{check_observation_shapes, Environment, Successor};
use crate::logging::StatsLogger;
use crate::utils::stats::{median, OnlineMeanVariance};
use crate::{PpoError, Prng};
use log::info;
use ndarray::ArrayD;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Named evaluation statistics.
pub type EvalStats = BTreeMap<String, f64>;

/// Chooses actions from single (unbatched) observations.
pub trait Actor {
    /// Choose an action given one observation (one array per observation component).
    fn act(&mut self, observation: &[ArrayD<f32>]) -> Result<usize, PpoError>;
}

impl<T: Actor + ?Sized> Actor for &'_ mut T {
    fn act(&mut self, observation: &[ArrayD<f32>]) -> Result<usize, PpoError> {
        T::act(self, observation)
    }
}

/// Evaluates an actor and reports named statistics.
pub trait Evaluator {
    /// Evaluate an actor.
    ///
    /// # Args
    /// * `actor`: The actor to evaluate.
    /// * `logger`: Receives evaluation statistics.
    /// * `index`: Sequence number of this evaluation.
    fn evaluate(
        &mut self,
        actor: &mut dyn Actor,
        logger: &mut dyn StatsLogger,
        index: u64,
    ) -> Result<EvalStats, PpoError>;
}

/// Evaluates an actor by running complete episodes in an environment.
///
/// Reports `mean_reward`, `median_reward` and `mean_length` over the episodes.
/// The environment must end every episode; wrap it in a
/// [`StepLimit`](crate::envs::StepLimit) otherwise.
#[derive(Debug, Clone)]
pub struct EpisodeEvaluator<E> {
    env: E,
    num_episodes: usize,
    rng: Prng,
}

impl<E: Environment> EpisodeEvaluator<E> {
    pub fn new(env: E, num_episodes: usize, seed: u64) -> Self {
        Self {
            env,
            num_episodes,
            rng: Prng::seed_from_u64(seed),
        }
    }

    /// Run one episode. Returns the total reward and the number of steps.
    fn run_episode(&mut self, actor: &mut dyn Actor) -> Result<(f64, u64), PpoError> {
        let shapes = self.env.observation_shapes();
        let num_actions = self.env.num_actions();
        let mut state = self.env.initial_state(&mut self.rng);
        let mut total_reward = 0.0;
        let mut length = 0;
        loop {
            let observation = self.env.observe(&state, &mut self.rng);
            check_observation_shapes(&observation, &shapes, &[])?;
            let action = actor.act(&observation)?;
            if action >= num_actions {
                #[allow(clippy::cast_possible_wrap)]
                return Err(PpoError::InvalidAction {
                    action: action as i64,
                    num_actions,
                });
            }
            let (successor, reward) = self.env.step(state, action, &mut self.rng);
            total_reward += reward;
            length += 1;
            match successor {
                Successor::Continue(next) => state = next,
                Successor::Terminate | Successor::Interrupt(_) => {
                    return Ok((total_reward, length));
                }
            }
        }
    }
}

impl<E: Environment> Evaluator for EpisodeEvaluator<E> {
    fn evaluate(
        &mut self,
        actor: &mut dyn Actor,
        mut logger: &mut dyn StatsLogger,
        index: u64,
    ) -> Result<EvalStats, PpoError> {
        let mut rewards = Vec::with_capacity(self.num_episodes);
        let mut lengths = OnlineMeanVariance::<f64>::new();
        for _ in 0..self.num_episodes {
            let (reward, length) = self.run_episode(actor)?;
            rewards.push(reward);
            #[allow(clippy::cast_precision_loss)]
            lengths.push(length as f64);
        }

        let rewards_stats: OnlineMeanVariance<f64> = rewards.iter().copied().collect();
        let mut stats = EvalStats::new();
        if let (Some(mean_reward), Some(median_reward), Some(mean_length)) = (
            rewards_stats.mean(),
            median(&rewards),
            lengths.mean(),
        ) {
            stats.insert("mean_reward".into(), mean_reward);
            stats.insert("median_reward".into(), median_reward);
            stats.insert("mean_length".into(), mean_length);

            let mut scoped = (&mut logger).with_scope("eval");
            let mut eval_logger = scoped.group();
            eval_logger.log_scalar("mean_reward", mean_reward);
            eval_logger.log_scalar("median_reward", median_reward);
            eval_logger.log_scalar("mean_length", mean_length);
            eval_logger.log_counter_increment("episodes", rewards.len() as u64);
            drop(eval_logger);
            logger.flush();

            info!(
                "evaluation {}: mean reward {:.3}, median reward {:.3}, mean length {:.1}",
                index, mean_reward, median_reward, mean_length
            );
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{CartPole, DeterministicBandit, StepLimit};
    use crate::logging::testing::RecordingLogger;

    struct ConstantActor(usize);

    impl Actor for ConstantActor {
        fn act(&mut self, _: &[ArrayD<f32>]) -> Result<usize, PpoError> {
            Ok(self.0)
        }
    }

    #[test]
    fn bandit_rewards() {
        let env = DeterministicBandit::from_values([0.0, 2.0]);
        let mut evaluator = EpisodeEvaluator::new(env, 5, 0);
        let mut logger = RecordingLogger::default();
        let stats = evaluator
            .evaluate(&mut ConstantActor(1), &mut logger, 0)
            .unwrap();
        assert_eq!(stats["mean_reward"], 2.0);
        assert_eq!(stats["median_reward"], 2.0);
        assert_eq!(stats["mean_length"], 1.0);
        assert_eq!(logger.scalars("eval/mean_reward"), vec![2.0]);
        assert_eq!(logger.flushes, 1);
    }

    #[test]
    fn step_limited_lengths() {
        let env = StepLimit::new(CartPole::default(), 5);
        let mut evaluator = EpisodeEvaluator::new(env, 3, 0);
        let stats = evaluator
            .evaluate(&mut ConstantActor(0), &mut (), 1)
            .unwrap();
        assert!(stats["mean_length"] <= 5.0);
        assert_eq!(stats["mean_reward"], stats["mean_length"]);
    }

    #[test]
    fn invalid_action_is_error() {
        let env = DeterministicBandit::from_values([0.0, 2.0]);
        let mut evaluator = EpisodeEvaluator::new(env, 1, 0);
        assert!(matches!(
            evaluator.evaluate(&mut ConstantActor(2), &mut (), 0),
            Err(PpoError::InvalidAction {
                action: 2,
                num_actions: 2
            })
        ));
    }

    #[test]
    fn no_episodes_gives_no_stats() {
        let env = DeterministicBandit::from_values([1.0]);
        let mut evaluator = EpisodeEvaluator::new(env, 0, 0);
        let stats = evaluator
            .evaluate(&mut ConstantActor(0), &mut (), 0)
            .unwrap();
        assert!(stats.is_empty());
    }
}
