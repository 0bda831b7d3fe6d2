use super::{Environment, Observation, Successor};
use crate::Prng;
use ndarray::arr1;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Configuration for the [`CartPole`] environment.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    /// Physics configuration
    pub physics: PhysicalConstants,
    /// Episode configuration
    pub params: EnvironmentParams,
}

impl CartPoleConfig {
    pub fn build(&self) -> CartPole {
        CartPole::new(self.physics, self.params)
    }
}

/// Cart-Pole environment
///
/// A simulated cart on a track with a pole attached by a hinge on top.
/// The goal is to keep the pole upright by pushing the cart left (action `0`) or right (`1`).
/// Every step yields a reward of 1 and the episode terminates once the cart leaves the track
/// or the pole tips past the maximum angle.
///
/// The observation is a single array `[cart_position, cart_velocity, pole_angle,
/// pole_angular_velocity]`.
///
/// Dynamics follow [Florian (2005)][florian2005] with defaults from the
/// [OpenAI Gym CartPole-v1 environment][gym_cartpole].
/// Episodes are unbounded; wrap in [`StepLimit`](super::StepLimit) to cut them off.
///
/// [florian2005]: https://coneural.org/florian/papers/05_cart_pole.pdf
/// [gym_cartpole]: https://gym.openai.com/envs/CartPole-v1/
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPole {
    dynamics: Dynamics,
    params: EnvironmentParams,
}

impl CartPole {
    pub fn new(physics: PhysicalConstants, params: EnvironmentParams) -> Self {
        Self {
            dynamics: physics.into(),
            params,
        }
    }

    fn out_of_bounds(&self, state: &CartPoleState) -> bool {
        state.cart_position.abs() > self.params.max_pos
            || state.pole_angle.abs() > self.params.max_angle
    }
}

impl Environment for CartPole {
    type State = CartPoleState;

    fn observation_shapes(&self) -> Vec<Vec<usize>> {
        vec![vec![4]]
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        let dist = Uniform::new_inclusive(-0.05, 0.05);
        CartPoleState {
            cart_position: dist.sample(rng),
            cart_velocity: dist.sample(rng),
            pole_angle: dist.sample(rng),
            pole_angular_velocity: dist.sample(rng),
            friction_sign_positive: true,
        }
    }

    fn observe(&self, state: &Self::State, _: &mut Prng) -> Observation {
        #[allow(clippy::cast_possible_truncation)]
        let values = arr1(&[
            state.cart_position as f32,
            state.cart_velocity as f32,
            state.pole_angle as f32,
            state.pole_angular_velocity as f32,
        ]);
        vec![values.into_dyn()]
    }

    fn step(
        &self,
        state: Self::State,
        action: usize,
        _: &mut Prng,
    ) -> (Successor<Self::State>, f64) {
        let force = if action == 0 {
            -self.params.action_force
        } else {
            self.params.action_force
        };
        let next_state = self.dynamics.advance(&state, force);
        // Terminate rather than interrupt: no rewards follow a fallen pole
        let successor = if self.out_of_bounds(&next_state) {
            Successor::Terminate
        } else {
            Successor::Continue(next_state)
        };
        (successor, 1.0)
    }
}

/// Physical constants for the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    /// Downward acceleration of gravity (m/s^2)
    pub gravity: f64,
    /// Mass of the cart (kg)
    pub mass_cart: f64,
    /// Mass of the pole (kg)
    pub mass_pole: f64,
    /// Half the length of the pole (m)
    pub length_half_pole: f64,
    /// Coefficient of friction between the cart and the track.
    pub friction_cart: f64,
    /// Coefficient of friction at the hinge.
    pub friction_pole: f64,
    /// Simulation time step (s)
    pub time_step: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole: 0.1,
            length_half_pole: 0.5,
            friction_cart: 0.01,
            friction_pole: 0.01,
            time_step: 0.02,
        }
    }
}

/// Episode parameters for [`CartPole`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentParams {
    /// Magnitude of the force (N) applied by actions.
    pub action_force: f64,
    /// Maximum absolute cart position (m).
    pub max_pos: f64,
    /// Maximum absolute pole angle from vertical (radians).
    pub max_angle: f64,
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        Self {
            action_force: 10.0,
            max_pos: 2.4,
            max_angle: 12.0f64.to_radians(),
        }
    }
}

/// State of the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPoleState {
    /// Cart position from the track midpoint (m).
    pub cart_position: f64,
    /// Cart velocity (m/s).
    pub cart_velocity: f64,
    /// Angle of the pole from vertical (radians).
    pub pole_angle: f64,
    /// Pole angular velocity about the hinge (radians / s).
    pub pole_angular_velocity: f64,
    /// Sign of `normal_force * cart_velocity` on the previous step.
    ///
    /// The friction term depends on its own sign so the previous sign is tried first
    /// and flipped if the result is inconsistent.
    friction_sign_positive: bool,
}

/// Physical constants with precomputed derived quantities.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
struct Dynamics {
    c: PhysicalConstants,
    /// `gravity * (mass_cart + mass_pole)`
    total_weight: f64,
    /// `1 / (mass_cart + mass_pole)`
    inv_total_mass: f64,
    /// `mass_pole * length_half_pole`
    pole_moment: f64,
}

impl Default for Dynamics {
    fn default() -> Self {
        PhysicalConstants::default().into()
    }
}

impl From<PhysicalConstants> for Dynamics {
    fn from(c: PhysicalConstants) -> Self {
        let total_mass = c.mass_cart + c.mass_pole;
        Self {
            c,
            total_weight: c.gravity * total_mass,
            inv_total_mass: total_mass.recip(),
            pole_moment: c.mass_pole * c.length_half_pole,
        }
    }
}

/// Trigonometric terms shared by the dynamics equations.
struct Trig {
    sin: f64,
    cos: f64,
    omega_sq: f64,
}

impl Dynamics {
    /// Advance one time step with the given horizontal force (N) applied to the cart.
    fn advance(&self, state: &CartPoleState, force: f64) -> CartPoleState {
        let (sin, cos) = state.pole_angle.sin_cos();
        let trig = Trig {
            sin,
            cos,
            omega_sq: state.pole_angular_velocity * state.pole_angular_velocity,
        };

        let mut friction = if state.friction_sign_positive {
            self.c.friction_cart
        } else {
            -self.c.friction_cart
        };
        let mut angular_acc = self.angular_acceleration(state, &trig, force, friction);
        let mut normal = self.normal_force(&trig, angular_acc);
        let friction_sign_positive = (normal * state.cart_velocity).is_sign_positive();
        if friction_sign_positive != state.friction_sign_positive {
            friction = -friction;
            angular_acc = self.angular_acceleration(state, &trig, force, friction);
            normal = self.normal_force(&trig, angular_acc);
        }

        let pole_force = self.pole_moment * (trig.omega_sq * trig.sin + angular_acc * trig.cos);
        let cart_acc = (force + pole_force - friction * normal) * self.inv_total_mass;

        // Semi-implicit Euler
        let dt = self.c.time_step;
        let cart_velocity = state.cart_velocity + dt * cart_acc;
        CartPoleState {
            cart_position: state.cart_position + dt * cart_velocity,
            cart_velocity,
            pole_angle: state.pole_angle + dt * state.pole_angular_velocity,
            pole_angular_velocity: state.pole_angular_velocity + dt * angular_acc,
            friction_sign_positive,
        }
    }

    /// Pole angular acceleration (Florian 2005, eq. 21).
    fn angular_acceleration(
        &self,
        state: &CartPoleState,
        trig: &Trig,
        force: f64,
        friction: f64,
    ) -> f64 {
        let g = self.c.gravity;
        let alpha = (-force - self.pole_moment * trig.omega_sq * (trig.sin + friction * trig.cos))
            * self.inv_total_mass;
        let beta = self.c.friction_pole * state.pole_angular_velocity / self.pole_moment;
        let numerator = g * trig.sin + trig.cos * (alpha + g * friction) - beta;
        let denominator = self.c.length_half_pole
            * (4.0 / 3.0
                - self.c.mass_pole * trig.cos * self.inv_total_mass * (trig.cos - friction));
        numerator / denominator
    }

    /// Normal force of the track on the cart (N). Positive when pressing down.
    fn normal_force(&self, trig: &Trig, angular_acc: f64) -> f64 {
        self.total_weight
            - self.pole_moment * (angular_acc * trig.sin + trig.omega_sq * trig.cos)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn run_default() {
        testing::check_environment(&CartPole::default(), 1000, 0);
    }

    #[test]
    fn observation_matches_state() {
        let env = CartPole::default();
        let mut rng = Prng::seed_from_u64(3);
        let state = env.initial_state(&mut rng);
        let obs = env.observe(&state, &mut rng);
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].shape(), &[4]);
        assert!(obs[0].iter().all(|x| x.abs() <= 0.05));
    }

    #[test]
    fn constant_push_terminates() {
        let env = CartPole::default();
        let mut rng = Prng::seed_from_u64(0);
        let mut state = env.initial_state(&mut rng);
        for _ in 0..200 {
            match env.step(state, 1, &mut rng) {
                (Successor::Continue(s), reward) => {
                    assert_eq!(reward, 1.0);
                    state = s;
                }
                (Successor::Terminate, _) => return,
                (Successor::Interrupt(_), _) => panic!("cartpole never interrupts"),
            }
        }
        panic!("pushing right forever should drop the pole");
    }

    #[test]
    fn push_direction_moves_cart() {
        let env = CartPole::default();
        let mut rng = Prng::seed_from_u64(0);
        let state = env.initial_state(&mut rng);
        let right = env.step(state, 1, &mut rng).0.into_continue().unwrap();
        let left = env.step(state, 0, &mut rng).0.into_continue().unwrap();
        assert!(right.cart_velocity > left.cart_velocity);
    }
}
