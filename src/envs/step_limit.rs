use super::{Environment, Observation, Successor};
use crate::Prng;

/// Environment wrapper that cuts off episodes after a set number of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepLimit<E> {
    pub inner: E,
    /// Maximum number of steps per episode
    pub max_steps_per_episode: u64,
}

impl<E> StepLimit<E> {
    pub const fn new(inner: E, max_steps_per_episode: u64) -> Self {
        Self {
            inner,
            max_steps_per_episode,
        }
    }
}

impl<E: Environment> Environment for StepLimit<E> {
    /// `(inner_state, current_steps)`
    type State = (E::State, u64);

    fn observation_shapes(&self) -> Vec<Vec<usize>> {
        self.inner.observation_shapes()
    }

    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        (self.inner.initial_state(rng), 0)
    }

    fn observe(&self, state: &Self::State, rng: &mut Prng) -> Observation {
        self.inner.observe(&state.0, rng)
    }

    fn step(
        &self,
        state: Self::State,
        action: usize,
        rng: &mut Prng,
    ) -> (Successor<Self::State>, f64) {
        let (inner_state, current_steps) = state;
        let (successor, reward) = self.inner.step(inner_state, action, rng);
        let current_steps = current_steps + 1;

        // Cut off the episode without marking the state as terminal
        let successor = match successor {
            Successor::Continue(s) if current_steps >= self.max_steps_per_episode => {
                Successor::Interrupt(s)
            }
            s => s,
        };
        (successor.map(|s| (s, current_steps)), reward)
    }
}
