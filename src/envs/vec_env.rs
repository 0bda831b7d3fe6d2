use super::{check_observation_shapes, Environment, Observation, Successor, VecEnvironment, VecStep};
use crate::{PpoError, Prng};
use log::debug;
use ndarray::{ArrayD, ArrayViewD, Axis};
use rand::{Rng, SeedableRng};

/// One independent copy of the environment.
#[derive(Debug)]
struct Worker<S> {
    /// Current state; `None` before the first reset.
    state: Option<S>,
    rng: Prng,
}

impl<S> Worker<S> {
    fn reset<E: Environment<State = S> + ?Sized>(&mut self, env: &E) -> Observation {
        let state = env.initial_state(&mut self.rng);
        let observation = env.observe(&state, &mut self.rng);
        self.state = Some(state);
        observation
    }

    /// Take one step, starting a new episode if the current one ends.
    ///
    /// # Returns
    /// The observation of the next state (the new initial state if the episode ended),
    /// the step reward, and whether the episode ended.
    fn step<E: Environment<State = S> + ?Sized>(
        &mut self,
        env: &E,
        action: usize,
    ) -> (Observation, f64, bool) {
        let state = match self.state.take() {
            Some(state) => state,
            None => env.initial_state(&mut self.rng),
        };
        let (successor, reward) = env.step(state, action, &mut self.rng);
        let (next_state, done) = match successor {
            Successor::Continue(state) => (state, false),
            Successor::Terminate | Successor::Interrupt(_) => {
                (env.initial_state(&mut self.rng), true)
            }
        };
        let observation = env.observe(&next_state, &mut self.rng);
        self.state = Some(next_state);
        (observation, reward, done)
    }
}

/// Vectorized environment that steps a fixed set of workers in parallel threads.
///
/// Every worker has its own state and random number generator, seeded from a single seed,
/// so results do not depend on the number of threads.
/// Workers whose episode ends are automatically reset.
pub struct ParallelVecEnv<E: Environment> {
    env: E,
    workers: Vec<Worker<E::State>>,
    num_threads: usize,
}

impl<E: Environment> ParallelVecEnv<E> {
    /// Create a new vectorized environment.
    ///
    /// # Args
    /// * `env`: The environment definition shared by all workers.
    /// * `num_workers`: Number of independent environment instances.
    /// * `num_threads`: Maximum number of threads used to step workers.
    /// * `seed`: Seed for the per-worker random number generators.
    pub fn new(env: E, num_workers: usize, num_threads: usize, seed: u64) -> Result<Self, PpoError> {
        if num_workers == 0 {
            return Err(PpoError::InvalidConfig(
                "num_workers must be at least 1".into(),
            ));
        }
        if env.num_actions() == 0 {
            return Err(PpoError::InvalidConfig(
                "environment must have at least one action".into(),
            ));
        }
        let mut seed_rng = Prng::seed_from_u64(seed);
        let workers = (0..num_workers)
            .map(|_| Worker {
                state: None,
                rng: Prng::seed_from_u64(seed_rng.gen()),
            })
            .collect();
        let num_threads = num_threads.clamp(1, num_workers);
        debug!(
            "created vectorized environment with {} workers on {} threads",
            num_workers, num_threads
        );
        Ok(Self {
            env,
            workers,
            num_threads,
        })
    }

    /// The shared environment definition.
    pub const fn env(&self) -> &E {
        &self.env
    }

    fn stack(&self, observations: &[Observation]) -> Result<Vec<ArrayD<f32>>, PpoError> {
        let shapes = self.env.observation_shapes();
        for observation in observations {
            check_observation_shapes(observation, &shapes, &[])?;
        }
        (0..shapes.len())
            .map(|component| {
                let views: Vec<ArrayViewD<f32>> =
                    observations.iter().map(|obs| obs[component].view()).collect();
                Ok(ndarray::stack(Axis(0), &views)?)
            })
            .collect()
    }
}

impl<E> ParallelVecEnv<E>
where
    E: Environment + Sync,
    E::State: Send,
{
    /// Apply `f` to every worker and its index, in parallel, preserving worker order.
    fn map_workers<T, F>(&mut self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize, &mut Worker<E::State>, &E) -> T + Sync,
    {
        let env = &self.env;
        if self.num_threads <= 1 {
            return self
                .workers
                .iter_mut()
                .enumerate()
                .map(|(i, worker)| f(i, worker, env))
                .collect();
        }

        let chunk_size = (self.workers.len() + self.num_threads - 1) / self.num_threads;
        let f = &f;
        crossbeam::scope(|scope| {
            let threads: Vec<_> = self
                .workers
                .chunks_mut(chunk_size)
                .enumerate()
                .map(|(chunk_index, chunk)| {
                    scope.spawn(move |_| {
                        chunk
                            .iter_mut()
                            .enumerate()
                            .map(|(i, worker)| f(chunk_index * chunk_size + i, worker, env))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            threads
                .into_iter()
                .flat_map(|t| t.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
        .unwrap_or_else(|e| std::panic::resume_unwind(e))
    }
}

impl<E> VecEnvironment for ParallelVecEnv<E>
where
    E: Environment + Sync,
    E::State: Send,
{
    fn observation_shapes(&self) -> Vec<Vec<usize>> {
        self.env.observation_shapes()
    }

    fn num_actions(&self) -> usize {
        self.env.num_actions()
    }

    fn num_workers(&self) -> usize {
        self.workers.len()
    }

    fn reset(&mut self) -> Result<Vec<ArrayD<f32>>, PpoError> {
        let observations = self.map_workers(|_, worker, env| worker.reset(env));
        self.stack(&observations)
    }

    fn step(&mut self, actions: &[i64]) -> Result<VecStep, PpoError> {
        if actions.len() != self.workers.len() {
            return Err(PpoError::ActionCount {
                expected: self.workers.len(),
                actual: actions.len(),
            });
        }
        let num_actions = self.env.num_actions();
        let mut indices = Vec::with_capacity(actions.len());
        for &action in actions {
            match usize::try_from(action) {
                Ok(a) if a < num_actions => indices.push(a),
                _ => return Err(PpoError::InvalidAction { action, num_actions }),
            }
        }

        let results = self.map_workers(|i, worker, env| worker.step(env, indices[i]));

        let mut observations = Vec::with_capacity(results.len());
        let mut rewards = Vec::with_capacity(results.len());
        let mut dones = Vec::with_capacity(results.len());
        for (observation, reward, done) in results {
            observations.push(observation);
            #[allow(clippy::cast_possible_truncation)]
            rewards.push(reward as f32);
            dones.push(done);
        }
        Ok(VecStep {
            observations: self.stack(&observations)?,
            rewards,
            dones,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CartPole, DeterministicBandit, StepLimit};
    use super::*;
    use rstest::rstest;

    #[test]
    fn reset_stacks_worker_observations() {
        let mut env = ParallelVecEnv::new(CartPole::default(), 3, 2, 0).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].shape(), &[3, 4]);
    }

    #[test]
    fn bandit_step_rewards_and_dones() {
        let bandit = DeterministicBandit::from_values([0.0, 1.0]);
        let mut env = ParallelVecEnv::new(bandit, 4, 2, 0).unwrap();
        env.reset().unwrap();
        let step = env.step(&[0, 1, 1, 0]).unwrap();
        assert_eq!(step.rewards, vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(step.dones, vec![true; 4]);
        assert_eq!(step.observations[0].shape(), &[4, 1]);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(8)]
    fn thread_count_does_not_change_results(#[case] num_threads: usize) {
        let run = |threads| {
            let mut env = ParallelVecEnv::new(StepLimit::new(CartPole::default(), 10), 5, threads, 7)
                .unwrap();
            let mut all = vec![env.reset().unwrap()];
            for t in 0..30 {
                let actions: Vec<i64> = (0..5).map(|i| (i + t) % 2).collect();
                all.push(env.step(&actions).unwrap().observations);
            }
            all
        };
        assert_eq!(run(1), run(num_threads));
    }

    #[test]
    fn auto_reset_after_step_limit() {
        let mut env = ParallelVecEnv::new(StepLimit::new(CartPole::default(), 2), 2, 1, 0).unwrap();
        env.reset().unwrap();
        assert_eq!(env.step(&[0, 1]).unwrap().dones, vec![false, false]);
        assert_eq!(env.step(&[1, 0]).unwrap().dones, vec![true, true]);
        // New episodes have started
        assert_eq!(env.step(&[0, 1]).unwrap().dones, vec![false, false]);
    }

    #[test]
    fn rejects_wrong_action_count() {
        let mut env = ParallelVecEnv::new(CartPole::default(), 2, 1, 0).unwrap();
        env.reset().unwrap();
        assert!(matches!(
            env.step(&[0]),
            Err(PpoError::ActionCount {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn rejects_out_of_range_action() {
        let mut env = ParallelVecEnv::new(CartPole::default(), 2, 1, 0).unwrap();
        env.reset().unwrap();
        assert!(matches!(
            env.step(&[0, 2]),
            Err(PpoError::InvalidAction {
                action: 2,
                num_actions: 2
            })
        ));
        assert!(matches!(
            env.step(&[-1, 0]),
            Err(PpoError::InvalidAction { action: -1, .. })
        ));
    }

    #[test]
    fn zero_workers_is_invalid() {
        assert!(matches!(
            ParallelVecEnv::new(CartPole::default(), 0, 1, 0),
            Err(PpoError::InvalidConfig(_))
        ));
    }
}
