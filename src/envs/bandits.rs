use super::{Environment, Observation, Successor};
use crate::{PpoError, Prng};
use ndarray::{arr1, ArrayD};
use rand::distributions::{Bernoulli, Distribution};

/// A constant single-element observation shared by the bandits.
fn unit_observation() -> Observation {
    vec![arr1(&[1.0_f32]).into_dyn()]
}

/// A multi-armed bandit with a fixed reward for each arm.
///
/// Every episode is a single step: the chosen arm pays its reward and the episode terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct DeterministicBandit {
    rewards: Vec<f64>,
}

impl DeterministicBandit {
    pub fn from_values<I: IntoIterator<Item = f64>>(rewards: I) -> Self {
        Self {
            rewards: rewards.into_iter().collect(),
        }
    }
}

impl Environment for DeterministicBandit {
    type State = ();

    fn observation_shapes(&self) -> Vec<Vec<usize>> {
        vec![vec![1]]
    }

    fn num_actions(&self) -> usize {
        self.rewards.len()
    }

    fn initial_state(&self, _: &mut Prng) -> Self::State {}

    fn observe(&self, _: &Self::State, _: &mut Prng) -> Observation {
        unit_observation()
    }

    fn step(&self, _: Self::State, action: usize, _: &mut Prng) -> (Successor<()>, f64) {
        (Successor::Terminate, self.rewards[action])
    }
}

/// A multi-armed bandit where each arm pays 1 with a fixed probability and 0 otherwise.
#[derive(Debug, Clone)]
pub struct BernoulliBandit {
    distributions: Vec<Bernoulli>,
}

impl BernoulliBandit {
    /// Create a bandit from the success probability of each arm.
    ///
    /// Fails if any probability is outside `[0, 1]`.
    pub fn from_probabilities<I: IntoIterator<Item = f64>>(
        probabilities: I,
    ) -> Result<Self, PpoError> {
        let distributions: Vec<Bernoulli> = probabilities
            .into_iter()
            .map(|p| {
                Bernoulli::new(p).map_err(|_| {
                    PpoError::InvalidConfig(format!("arm probability {} is not in [0, 1]", p))
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { distributions })
    }
}

impl Environment for BernoulliBandit {
    type State = ();

    fn observation_shapes(&self) -> Vec<Vec<usize>> {
        vec![vec![1]]
    }

    fn num_actions(&self) -> usize {
        self.distributions.len()
    }

    fn initial_state(&self, _: &mut Prng) -> Self::State {}

    fn observe(&self, _: &Self::State, _: &mut Prng) -> Vec<ArrayD<f32>> {
        unit_observation()
    }

    fn step(&self, _: Self::State, action: usize, rng: &mut Prng) -> (Successor<()>, f64) {
        let reward = if self.distributions[action].sample(rng) {
            1.0
        } else {
            0.0
        };
        (Successor::Terminate, reward)
    }
}
