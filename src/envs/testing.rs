//! Environment testing utilities
use super::{Environment, Successor};
use crate::Prng;
use rand::{Rng, SeedableRng};

/// Run an environment with uniform random actions and check that invariants are satisfied.
///
/// Checks that every observation matches `observation_shapes()` and every reward is finite.
pub fn check_environment<E: Environment>(env: &E, num_steps: u64, seed: u64) {
    let shapes = env.observation_shapes();
    let num_actions = env.num_actions();
    assert!(num_actions > 0);

    let mut rng = Prng::seed_from_u64(seed);
    let mut state = env.initial_state(&mut rng);
    for _ in 0..num_steps {
        let observation = env.observe(&state, &mut rng);
        assert_eq!(observation.len(), shapes.len());
        for (component, shape) in observation.iter().zip(&shapes) {
            assert_eq!(component.shape(), shape.as_slice());
        }

        let action = rng.gen_range(0..num_actions);
        let (successor, reward) = env.step(state, action, &mut rng);
        assert!(reward.is_finite());
        state = match successor {
            Successor::Continue(s) => s,
            Successor::Terminate | Successor::Interrupt(_) => env.initial_state(&mut rng),
        };
    }
}
