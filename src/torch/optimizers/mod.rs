//! Optimizers
mod coptimizer;

pub use coptimizer::AdamConfig;

use tch::Tensor;

/// Rescale gradients in-place so that their combined L2 norm is at most `max_norm`.
///
/// Variables without a gradient are skipped.
///
/// # Returns
/// The total gradient norm before clipping.
pub fn clip_grad_norm(variables: &[Tensor], max_norm: f64) -> f64 {
    let _no_grad = tch::no_grad_guard();
    let grads: Vec<Tensor> = variables
        .iter()
        .map(Tensor::grad)
        .filter(Tensor::defined)
        .collect();
    let total_norm = grads
        .iter()
        .map(|g| f64::from(&g.norm()).powi(2))
        .sum::<f64>()
        .sqrt();
    // Small epsilon so that the scale is < 1 when the norm equals max_norm exactly.
    let scale = max_norm / (total_norm + 1e-6);
    if scale < 1.0 {
        for mut grad in grads {
            grad *= scale;
        }
    }
    total_norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn clips_large_gradients() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().ones("x", &[4]);
        (&x * 3.0).sum(Kind::Float).backward();
        // Gradient is [3, 3, 3, 3] with norm 6
        let norm = clip_grad_norm(&vs.trainable_variables(), 1.0);
        assert!((norm - 6.0).abs() < 1e-5);
        let clipped = f64::from(&x.grad().norm());
        assert!((clipped - 1.0).abs() < 1e-4, "clipped norm {}", clipped);
    }

    #[test]
    fn small_gradients_unchanged() {
        let vs = VarStore::new(Device::Cpu);
        let x = vs.root().ones("x", &[1]);
        (&x * 0.5).sum(Kind::Float).backward();
        let norm = clip_grad_norm(&vs.trainable_variables(), 1.0);
        assert!((norm - 0.5).abs() < 1e-6);
        assert!((f64::from(&x.grad().norm()) - 0.5).abs() < 1e-6);
    }
}
