//! Proximal policy optimization
mod agent;
pub mod bookkeeping;
mod config;
pub mod gae;
pub mod loss;
pub mod rollout;

pub use agent::{PpoAgent, TrainHooks, TrainSummary};
pub use config::{PpoConfig, TrainConfig};
pub use rollout::{Minibatch, RolloutStorage};
