//! Learning rate schedules driven by evaluation scores
use crate::PpoError;
use log::info;
use serde::{Deserialize, Serialize};

/// Adjusts the learning rate in response to an evaluation metric.
pub trait LrScheduler {
    /// Observe a new metric value.
    ///
    /// # Returns
    /// The learning rate to use from now on. A rate of 0 or less requests that training stop.
    fn step(&mut self, metric: f64, current_lr: f64) -> f64;
}

/// Whether lower or higher metric values are improvements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlateauMode {
    Min,
    Max,
}

/// Configuration for [`ReduceLrOnPlateau`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceLrOnPlateauConfig {
    pub mode: PlateauMode,
    /// Multiplier applied to the learning rate on each reduction.
    pub factor: f64,
    /// Number of non-improving steps tolerated before reducing.
    pub patience: usize,
    /// Relative change from the best value required to count as an improvement.
    pub threshold: f64,
    /// Lower bound on the reduced learning rate.
    pub min_lr: f64,
    /// After this many reductions, the next plateau sets the rate to 0.
    pub max_reductions: Option<usize>,
}

impl Default for ReduceLrOnPlateauConfig {
    fn default() -> Self {
        Self {
            mode: PlateauMode::Min,
            factor: 0.5,
            patience: 10,
            threshold: 1e-4,
            min_lr: 0.0,
            max_reductions: None,
        }
    }
}

impl ReduceLrOnPlateauConfig {
    pub fn build(&self) -> Result<ReduceLrOnPlateau, PpoError> {
        if !(self.factor > 0.0 && self.factor < 1.0) {
            return Err(PpoError::InvalidConfig(
                "plateau factor must be in (0, 1)".into(),
            ));
        }
        // A threshold of 1 turns the infinite initial best into NaN in min mode
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(PpoError::InvalidConfig(
                "plateau threshold must be in [0, 1)".into(),
            ));
        }
        if !(self.min_lr >= 0.0) {
            return Err(PpoError::InvalidConfig(
                "plateau min_lr must be non-negative".into(),
            ));
        }
        Ok(ReduceLrOnPlateau::new(*self))
    }
}

/// Reduce the learning rate when the metric stops improving.
///
/// After more than `patience` consecutive steps without an improvement of at least
/// `threshold` (relative to the best value so far), the learning rate is multiplied by
/// `factor`. Once `max_reductions` reductions have been made, the next plateau returns 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceLrOnPlateau {
    config: ReduceLrOnPlateauConfig,
    best: f64,
    num_bad_steps: usize,
    num_reductions: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(config: ReduceLrOnPlateauConfig) -> Self {
        let best = match config.mode {
            PlateauMode::Min => f64::INFINITY,
            PlateauMode::Max => f64::NEG_INFINITY,
        };
        Self {
            config,
            best,
            num_bad_steps: 0,
            num_reductions: 0,
        }
    }

    /// Relative threshold comparison, as in PyTorch's `ReduceLROnPlateau`.
    fn is_better(&self, metric: f64) -> bool {
        match self.config.mode {
            PlateauMode::Min => metric < self.best * (1.0 - self.config.threshold),
            PlateauMode::Max => metric > self.best * (1.0 + self.config.threshold),
        }
    }

    pub const fn num_reductions(&self) -> usize {
        self.num_reductions
    }
}

impl LrScheduler for ReduceLrOnPlateau {
    fn step(&mut self, metric: f64, current_lr: f64) -> f64 {
        if self.is_better(metric) {
            self.best = metric;
            self.num_bad_steps = 0;
            return current_lr;
        }
        self.num_bad_steps += 1;
        if self.num_bad_steps <= self.config.patience {
            return current_lr;
        }
        self.num_bad_steps = 0;

        if let Some(max_reductions) = self.config.max_reductions {
            if self.num_reductions >= max_reductions {
                info!("learning rate reductions exhausted");
                return 0.0;
            }
        }
        self.num_reductions += 1;
        let new_lr = (current_lr * self.config.factor).max(self.config.min_lr);
        info!("reducing learning rate to {:.3e}", new_lr);
        new_lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(patience: usize, max_reductions: Option<usize>) -> ReduceLrOnPlateau {
        ReduceLrOnPlateauConfig {
            patience,
            max_reductions,
            ..ReduceLrOnPlateauConfig::default()
        }
        .build()
        .unwrap()
    }

    #[test]
    fn keeps_rate_while_improving() {
        let mut s = scheduler(0, None);
        let mut lr = 1.0;
        for metric in [5.0, 4.0, 3.0, 2.0] {
            lr = s.step(metric, lr);
        }
        assert_eq!(lr, 1.0);
    }

    #[test]
    fn reduces_after_patience_bad_steps() {
        let mut s = scheduler(2, None);
        let mut lr = 1.0;
        lr = s.step(1.0, lr);
        lr = s.step(1.0, lr);
        lr = s.step(1.0, lr);
        assert_eq!(lr, 1.0);
        lr = s.step(1.0, lr);
        assert_eq!(lr, 0.5);
        assert_eq!(s.num_reductions(), 1);
    }

    #[test]
    fn max_mode() {
        let mut s = ReduceLrOnPlateauConfig {
            mode: PlateauMode::Max,
            patience: 0,
            ..ReduceLrOnPlateauConfig::default()
        }
        .build()
        .unwrap();
        assert_eq!(s.step(1.0, 1.0), 1.0);
        assert_eq!(s.step(2.0, 1.0), 1.0);
        assert_eq!(s.step(1.5, 1.0), 0.5);
    }

    #[test]
    fn negative_best_uses_scaled_threshold() {
        let mut s = ReduceLrOnPlateauConfig {
            mode: PlateauMode::Max,
            patience: 0,
            threshold: 0.1,
            ..ReduceLrOnPlateauConfig::default()
        }
        .build()
        .unwrap();
        assert_eq!(s.step(-10.0, 1.0), 1.0);
        // Better means above -10 * 1.1 = -11, so a small drop still counts
        assert_eq!(s.step(-10.5, 1.0), 1.0);
        // Best is now -10.5 with bound -11.55
        assert_eq!(s.step(-12.0, 1.0), 0.5);
    }

    #[test]
    fn respects_min_lr() {
        let mut s = ReduceLrOnPlateauConfig {
            patience: 0,
            min_lr: 0.3,
            ..ReduceLrOnPlateauConfig::default()
        }
        .build()
        .unwrap();
        s.step(1.0, 1.0);
        assert_eq!(s.step(1.0, 0.4), 0.3);
    }

    #[test]
    fn zero_after_max_reductions() {
        let mut s = scheduler(0, Some(1));
        let mut lr = 1.0;
        lr = s.step(1.0, lr);
        lr = s.step(1.0, lr);
        assert_eq!(lr, 0.5);
        lr = s.step(1.0, lr);
        assert_eq!(lr, 0.0);
    }

    #[test]
    fn rejects_threshold_of_one() {
        let config = ReduceLrOnPlateauConfig {
            threshold: 1.0,
            ..ReduceLrOnPlateauConfig::default()
        };
        assert!(matches!(config.build(), Err(PpoError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_bad_factor() {
        let config = ReduceLrOnPlateauConfig {
            factor: 1.5,
            ..ReduceLrOnPlateauConfig::default()
        };
        assert!(matches!(config.build(), Err(PpoError::InvalidConfig(_))));
    }
}
