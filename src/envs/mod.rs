//! Reinforcement learning environments
mod bandits;
mod cartpole;
mod step_limit;
#[cfg(test)]
pub mod testing;
mod vec_env;

pub use bandits::{BernoulliBandit, DeterministicBandit};
pub use cartpole::{CartPole, CartPoleConfig, CartPoleState, EnvironmentParams, PhysicalConstants};
pub use step_limit::StepLimit;
pub use vec_env::ParallelVecEnv;

use crate::{PpoError, Prng};
use ndarray::ArrayD;

/// An environment observation: one array per observation component.
pub type Observation = Vec<ArrayD<f32>>;

/// The successor of a state transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Successor<S> {
    /// The episode continues from this state.
    Continue(S),
    /// The episode ends in a terminal state; all future rewards are zero.
    Terminate,
    /// The episode is cut off at this (non-terminal) state.
    Interrupt(S),
}

impl<S> Successor<S> {
    /// Whether the transition ends the episode.
    pub const fn episode_done(&self) -> bool {
        !matches!(self, Self::Continue(_))
    }

    /// The successor state if the episode continues.
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_continue(self) -> Option<S> {
        match self {
            Self::Continue(state) => Some(state),
            _ => None,
        }
    }

    /// Transform the contained state.
    pub fn map<F, T>(self, f: F) -> Successor<T>
    where
        F: FnOnce(S) -> T,
    {
        match self {
            Self::Continue(state) => Successor::Continue(f(state)),
            Self::Terminate => Successor::Terminate,
            Self::Interrupt(state) => Successor::Interrupt(f(state)),
        }
    }
}

/// A reinforcement learning environment with a discrete action space.
///
/// This defines the environment dynamics and structure.
/// It does not internally manage state.
pub trait Environment {
    type State;

    /// Shape of each observation component (without any batch dimension).
    fn observation_shapes(&self) -> Vec<Vec<usize>>;

    /// Number of discrete actions. Actions are `0 .. num_actions`.
    fn num_actions(&self) -> usize;

    /// Sample a new initial state.
    fn initial_state(&self, rng: &mut Prng) -> Self::State;

    /// Observe a state.
    fn observe(&self, state: &Self::State, rng: &mut Prng) -> Observation;

    /// Sample a state transition.
    ///
    /// `action` must be less than `num_actions()`.
    ///
    /// # Returns
    /// * `successor`: The resulting state or the end of the episode.
    /// * `reward`: The reward value for this transition.
    fn step(
        &self,
        state: Self::State,
        action: usize,
        rng: &mut Prng,
    ) -> (Successor<Self::State>, f64);
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    type State = E::State;

    fn observation_shapes(&self) -> Vec<Vec<usize>> {
        E::observation_shapes(self)
    }
    fn num_actions(&self) -> usize {
        E::num_actions(self)
    }
    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        E::initial_state(self, rng)
    }
    fn observe(&self, state: &Self::State, rng: &mut Prng) -> Observation {
        E::observe(self, state, rng)
    }
    fn step(
        &self,
        state: Self::State,
        action: usize,
        rng: &mut Prng,
    ) -> (Successor<Self::State>, f64) {
        E::step(self, state, action, rng)
    }
}

/// The result of stepping every worker of a [`VecEnvironment`].
#[derive(Debug, Clone, PartialEq)]
pub struct VecStep {
    /// One array per observation component, each with shape `[num_workers, *component_shape]`.
    ///
    /// Workers whose episode ended have already been reset;
    /// their entry is the first observation of the new episode.
    pub observations: Vec<ArrayD<f32>>,
    /// Reward of each worker for this step.
    pub rewards: Vec<f32>,
    /// Whether each worker's episode ended on this step.
    pub dones: Vec<bool>,
}

/// A batch of environment instances ("workers") stepped in lockstep.
pub trait VecEnvironment {
    /// Shape of each observation component (without the worker dimension).
    fn observation_shapes(&self) -> Vec<Vec<usize>>;

    /// Number of discrete actions.
    fn num_actions(&self) -> usize;

    /// Number of workers.
    fn num_workers(&self) -> usize;

    /// Start a new episode on every worker.
    ///
    /// # Returns
    /// One array per observation component, each with shape `[num_workers, *component_shape]`.
    fn reset(&mut self) -> Result<Vec<ArrayD<f32>>, PpoError>;

    /// Take one step on every worker, one action per worker.
    fn step(&mut self, actions: &[i64]) -> Result<VecStep, PpoError>;
}

impl<V: VecEnvironment + ?Sized> VecEnvironment for Box<V> {
    fn observation_shapes(&self) -> Vec<Vec<usize>> {
        V::observation_shapes(self)
    }
    fn num_actions(&self) -> usize {
        V::num_actions(self)
    }
    fn num_workers(&self) -> usize {
        V::num_workers(self)
    }
    fn reset(&mut self) -> Result<Vec<ArrayD<f32>>, PpoError> {
        V::reset(self)
    }
    fn step(&mut self, actions: &[i64]) -> Result<VecStep, PpoError> {
        V::step(self, actions)
    }
}

/// Check that an observation matches the expected component shapes.
///
/// `batch_dims` are leading dimensions expected before each component shape.
pub(crate) fn check_observation_shapes(
    observation: &[ArrayD<f32>],
    expected_shapes: &[Vec<usize>],
    batch_dims: &[usize],
) -> Result<(), PpoError> {
    if observation.len() != expected_shapes.len() {
        return Err(PpoError::ObservationCount {
            expected: expected_shapes.len(),
            actual: observation.len(),
        });
    }
    for (index, (component, shape)) in observation.iter().zip(expected_shapes).enumerate() {
        let expected: Vec<usize> = batch_dims.iter().chain(shape).copied().collect();
        if component.shape() != expected.as_slice() {
            return Err(PpoError::ObservationShape {
                index,
                expected,
                actual: component.shape().to_vec(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn successor_episode_done() {
        assert!(!Successor::Continue(1).episode_done());
        assert!(Successor::<u8>::Terminate.episode_done());
        assert!(Successor::Interrupt(1).episode_done());
        assert_eq!(Successor::Continue(2).map(|x| x * 2), Successor::Continue(4));
    }

    #[test]
    fn observation_shape_check() {
        let obs = vec![Array2::<f32>::zeros((3, 4)).into_dyn()];
        assert!(check_observation_shapes(&obs, &[vec![4]], &[3]).is_ok());
        assert!(matches!(
            check_observation_shapes(&obs, &[vec![5]], &[3]),
            Err(PpoError::ObservationShape { index: 0, .. })
        ));
        let obs = vec![Array1::<f32>::zeros(4).into_dyn()];
        assert!(matches!(
            check_observation_shapes(&obs, &[vec![4], vec![1]], &[]),
            Err(PpoError::ObservationCount {
                expected: 2,
                actual: 1
            })
        ));
    }
}
