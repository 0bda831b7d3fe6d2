//! Experiment configuration
use crate::envs::CartPoleConfig;
use crate::model::MlpActorCriticConfig;
use crate::ppo::{PpoConfig, TrainConfig};
use crate::scheduling::ReduceLrOnPlateauConfig;
use crate::PpoError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Cart-pole environment with an episode step limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub cartpole: CartPoleConfig,
    /// Episodes are interrupted after this many steps.
    pub max_steps_per_episode: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            cartpole: CartPoleConfig::default(),
            max_steps_per_episode: 500,
        }
    }
}

/// Configuration of a complete training run.
///
/// Every field has a default so a JSON file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Seed for the environment workers, evaluation and torch.
    pub seed: u64,
    /// Threads used to step environment workers. All available cores if `None`.
    pub num_threads: Option<usize>,
    pub ppo: PpoConfig,
    pub train: TrainConfig,
    pub model: MlpActorCriticConfig,
    pub env: EnvConfig,
    /// Number of episodes per evaluation.
    pub eval_episodes: usize,
    /// Reduce the learning rate when the evaluation score plateaus.
    pub lr_schedule: Option<ReduceLrOnPlateauConfig>,
    /// Directory for statistics logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_threads: None,
            ppo: PpoConfig::default(),
            train: TrainConfig {
                score_name: Some("mean_reward".into()),
                high_is_better: true,
                ..TrainConfig::default()
            },
            model: MlpActorCriticConfig::default(),
            env: EnvConfig::default(),
            eval_episodes: 10,
            lr_schedule: None,
            log_dir: None,
        }
    }
}

impl ExperimentConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PpoError> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PpoError> {
        self.ppo.validate()?;
        self.train.validate()?;
        if self.env.max_steps_per_episode == 0 {
            return Err(PpoError::InvalidConfig(
                "max_steps_per_episode must be at least 1".into(),
            ));
        }
        if self.train.score_name.is_some() && self.eval_episodes == 0 {
            return Err(PpoError::InvalidConfig(
                "a score requires at least one evaluation episode".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_is_valid() {
        assert!(ExperimentConfig::default().validate().is_ok());
    }

    #[test]
    fn json_round_trip_default() {
        let config = ExperimentConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{
            "seed": 7,
            "ppo": {"num_workers": 8, "t_max": 128},
            "model": {"hidden_sizes": [32], "optimizer": {"learning_rate": 0.01}},
            "lr_schedule": {"mode": "Max", "patience": 3}
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.ppo.num_workers, 8);
        assert_eq!(config.ppo.batch_size, 32);
        assert_eq!(config.model.hidden_sizes, vec![32]);
        assert_eq!(config.model.optimizer.learning_rate, 0.01);
        assert_eq!(config.model.optimizer.beta2, 0.999);
        assert_eq!(config.env.max_steps_per_episode, 500);
        let schedule = config.lr_schedule.unwrap();
        assert_eq!(schedule.patience, 3);
        assert_eq!(schedule.factor, 0.5);
    }

    #[test]
    fn from_json_file_validates() {
        let path = std::env::temp_dir().join(format!("vecppo-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"ppo": {"t_max": 0}}"#).unwrap();
        let result = ExperimentConfig::from_json_file(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(PpoError::InvalidConfig(_))));
    }

    #[test]
    fn from_json_file_missing() {
        assert!(matches!(
            ExperimentConfig::from_json_file("/nonexistent/vecppo.json"),
            Err(PpoError::Io(_))
        ));
    }
}
