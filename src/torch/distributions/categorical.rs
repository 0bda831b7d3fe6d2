//! Categorical distribution
use tch::{Kind, Tensor};

/// Categorical distribution(s) over `0 .. NUM_EVENTS`.
#[derive(Debug)]
pub struct Categorical {
    /// Normalized log probability of each event.
    ///
    /// An f32 tensor of shape `[BATCH_SHAPE.., NUM_EVENTS]`.
    log_probs: Tensor,
}

impl Categorical {
    /// Initialize from possibly unnormalized log probabilities (logits).
    pub fn new(logits: &Tensor) -> Self {
        Self {
            log_probs: logits.log_softmax(-1, Kind::Float),
        }
    }

    /// Sample one event per distribution.
    ///
    /// Returns an i64 tensor with shape `[BATCH_SHAPE..]`.
    pub fn sample(&self) -> Tensor {
        let mut shape = self.log_probs.size();
        let num_events = shape.pop().unwrap_or(0);
        self.log_probs
            .exp()
            .reshape(&[-1, num_events])
            .multinomial(1, true)
            .reshape(&shape)
    }

    /// Log probability of each element.
    ///
    /// `elements` is an i64 tensor of shape `[BATCH_SHAPE..]`; so is the result.
    pub fn log_probs(&self, elements: &Tensor) -> Tensor {
        self.log_probs
            .gather(-1, &elements.unsqueeze(-1), false)
            .squeeze_dim(-1)
    }

    /// Entropy of each distribution, with shape `[BATCH_SHAPE..]`.
    pub fn entropy(&self) -> Tensor {
        // 0 * -inf terms (impossible events) are treated as 0
        let clamped_log_probs = self.log_probs.clamp_min(f64::from(f32::MIN));
        -(clamped_log_probs * self.log_probs.exp()).sum_dim_intlist(&[-1], false, Kind::Float)
    }
}
