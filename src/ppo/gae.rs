//! Generalized advantage estimation
use tch::{Kind, Tensor};

/// Discounted returns from generalized advantage estimation.
///
/// See "High-Dimensional Continuous Control Using Generalized Advantage Estimation"
/// by Schulman et al. (2016).
///
/// # Args
/// * `rewards`: Step rewards, shape `[T, N, 1]`.
/// * `values`: Value predictions, shape `[T + 1, N, 1]`. The last entry bootstraps the rollout.
/// * `masks`: `0` where the step ended an episode and `1` otherwise, shape `[T, N, 1]`.
/// * `gamma`: Discount factor.
/// * `lambda`: Interpolation between one-step TD (`0`) and Monte Carlo (`1`) targets.
///
/// # Returns
/// Returns with shape `[T + 1, N, 1]`: `gae_t + values_t`, with the bootstrap value in the
/// last slot.
pub fn gae_returns(
    rewards: &Tensor,
    values: &Tensor,
    masks: &Tensor,
    gamma: f64,
    lambda: f64,
) -> Tensor {
    let _no_grad = tch::no_grad_guard();
    let num_steps = rewards.size()[0];
    let mut returns = Vec::with_capacity(num_steps as usize + 1);
    returns.push(values.get(num_steps));

    let mut gae = values.get(0).zeros_like();
    for t in (0..num_steps).rev() {
        let value = values.get(t);
        let mask = masks.get(t);
        let delta = rewards.get(t) + values.get(t + 1) * gamma * &mask - &value;
        gae = delta + gae * (gamma * lambda) * &mask;
        returns.push(&gae + value);
    }
    returns.reverse();
    Tensor::stack(&returns, 0)
}

/// Standardize advantages to zero mean and unit variance.
///
/// Uses the unbiased standard deviation plus a small epsilon.
/// A single advantage is only centered.
pub fn normalize_advantages(advantages: &Tensor) -> Tensor {
    let centered = advantages - advantages.mean(Kind::Float);
    if advantages.numel() < 2 {
        return centered;
    }
    centered / (advantages.std(true) + 1e-8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f32]) -> Tensor {
        Tensor::of_slice(values).reshape(&[-1, 1, 1])
    }

    fn to_vec(tensor: &Tensor) -> Vec<f32> {
        Vec::<f32>::from(&tensor.flatten(0, -1))
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn matches_hand_computed_recursion() {
        let rewards = column(&[1.0, 0.0, 2.0]);
        let values = column(&[0.5, 1.0, -1.0, 3.0]);
        let masks = column(&[1.0, 1.0, 1.0]);
        let (gamma, lambda) = (0.9, 0.5);
        let returns = gae_returns(&rewards, &values, &masks, gamma, lambda);

        // delta_2 = 2 + 0.9 * 3 + 1 = 5.7; gae_2 = 5.7
        // delta_1 = 0 + 0.9 * -1 - 1 = -1.9; gae_1 = -1.9 + 0.45 * 5.7 = 0.665
        // delta_0 = 1 + 0.9 * 1 - 0.5 = 1.4; gae_0 = 1.4 + 0.45 * 0.665 = 1.69925
        assert_close(
            &to_vec(&returns),
            &[1.69925 + 0.5, 0.665 + 1.0, 5.7 - 1.0, 3.0],
        );
    }

    #[test]
    fn masks_cut_bootstrapping() {
        let rewards = column(&[1.0, 1.0]);
        let values = column(&[0.0, 0.0, 10.0]);
        let masks = column(&[1.0, 0.0]);
        let returns = gae_returns(&rewards, &values, &masks, 0.5, 1.0);
        // The final value is ignored because the last step ended the episode
        assert_close(&to_vec(&returns), &[1.5, 1.0, 10.0]);
    }

    #[test]
    fn zero_lambda_gives_td_targets() {
        let rewards = column(&[1.0, 2.0]);
        let values = column(&[3.0, 4.0, 5.0]);
        let masks = column(&[1.0, 1.0]);
        let returns = gae_returns(&rewards, &values, &masks, 0.5, 0.0);
        // R_t = r_t + gamma * V_{t+1}
        assert_close(&to_vec(&returns), &[3.0, 4.5, 5.0]);
    }

    #[test]
    fn workers_are_independent() {
        // Two workers, one of which finishes on the first step
        let rewards = Tensor::of_slice(&[1.0_f32, 1.0]).reshape(&[1, 2, 1]);
        let values = Tensor::of_slice(&[0.0_f32, 0.0, 2.0, 2.0]).reshape(&[2, 2, 1]);
        let masks = Tensor::of_slice(&[1.0_f32, 0.0]).reshape(&[1, 2, 1]);
        let returns = gae_returns(&rewards, &values, &masks, 1.0, 1.0);
        assert_close(&to_vec(&returns.get(0)), &[3.0, 1.0]);
    }

    #[test]
    fn normalized_mean_zero_std_one() {
        let advantages = Tensor::of_slice(&[1.0_f32, 2.0, 3.0, 10.0, -4.0]).reshape(&[5, 1, 1]);
        let normalized = normalize_advantages(&advantages);
        assert_eq!(normalized.size(), vec![5, 1, 1]);
        assert!(f64::from(&normalized.mean(Kind::Float)).abs() < 1e-6);
        assert!((f64::from(&normalized.std(true)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn single_advantage_is_centered() {
        let normalized = normalize_advantages(&column(&[3.0]));
        assert_close(&to_vec(&normalized), &[0.0]);
    }
}
