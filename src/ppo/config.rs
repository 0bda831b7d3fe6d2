use crate::PpoError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Proximal policy optimization hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpoConfig {
    /// Number of steps collected from each worker per update.
    pub t_max: usize,
    /// Number of parallel environment workers.
    pub num_workers: usize,
    /// Reward discount factor.
    pub gamma: f64,
    /// Generalized advantage estimation interpolation parameter.
    pub gae_lambda: f64,
    /// Number of optimization passes over each rollout.
    pub ppo_epochs: usize,
    /// Maximum distance of the probability ratio from 1 before clipping.
    pub clip_epsilon: f64,
    /// Minibatch size per worker. Each minibatch has `batch_size * num_workers` samples.
    pub batch_size: usize,
    /// Standardize advantages before the update.
    pub normalize_advantages: bool,
    /// Store zeros instead of the next observation for workers whose episode just ended.
    pub zero_done_observations: bool,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            t_max: 5,
            num_workers: 1,
            gamma: 0.99,
            gae_lambda: 0.95,
            ppo_epochs: 4,
            clip_epsilon: 0.2,
            batch_size: 32,
            normalize_advantages: true,
            zero_done_observations: true,
        }
    }
}

impl PpoConfig {
    pub fn validate(&self) -> Result<(), PpoError> {
        let require = |ok: bool, message: &str| {
            if ok {
                Ok(())
            } else {
                Err(PpoError::InvalidConfig(message.into()))
            }
        };
        require(self.t_max > 0, "t_max must be at least 1")?;
        require(self.num_workers > 0, "num_workers must be at least 1")?;
        require(self.ppo_epochs > 0, "ppo_epochs must be at least 1")?;
        require(self.batch_size > 0, "batch_size must be at least 1")?;
        require(
            (0.0..=1.0).contains(&self.gamma),
            "gamma must be in [0, 1]",
        )?;
        require(
            (0.0..=1.0).contains(&self.gae_lambda),
            "gae_lambda must be in [0, 1]",
        )?;
        require(
            self.clip_epsilon.is_finite() && self.clip_epsilon >= 0.0,
            "clip_epsilon must be finite and non-negative",
        )
    }

    /// Number of samples in each minibatch.
    pub const fn minibatch_size(&self) -> usize {
        self.batch_size * self.num_workers
    }
}

/// Training loop schedule: how long to train and when to log, evaluate and checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of rollout and update iterations.
    pub max_updates: u64,
    /// Log training statistics every this many updates.
    pub log_interval: u64,
    /// Evaluate every this many updates.
    pub eval_interval: u64,
    /// Save a model checkpoint every this many updates.
    pub dump_interval: u64,
    /// Directory for model checkpoints. The working directory if `None`.
    pub dump_dir: Option<PathBuf>,
    /// Name of the evaluation statistic used to select the best model and drive scheduling.
    pub score_name: Option<String>,
    /// Whether higher scores are better.
    pub high_is_better: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_updates: 5000,
            log_interval: 100,
            eval_interval: 5000,
            dump_interval: 100_000,
            dump_dir: None,
            score_name: None,
            high_is_better: false,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), PpoError> {
        for (name, value) in [
            ("log_interval", self.log_interval),
            ("eval_interval", self.eval_interval),
            ("dump_interval", self.dump_interval),
        ] {
            if value == 0 {
                return Err(PpoError::InvalidConfig(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}
