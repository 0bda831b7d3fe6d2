//! Proximal policy optimization on vectorized environments.
#![warn(clippy::cast_lossless)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)]
pub mod checkpoint;
pub mod config;
pub mod envs;
mod error;
pub mod evaluation;
pub mod logging;
pub mod model;
pub mod ppo;
pub mod scheduling;
pub mod torch;
pub mod utils;

pub use config::ExperimentConfig;
pub use envs::{Environment, ParallelVecEnv, VecEnvironment};
pub use error::PpoError;
pub use evaluation::{Actor, Evaluator};
pub use model::{ActorCriticModel, MlpActorCritic, MlpActorCriticConfig, PpoLosses};
pub use ppo::{PpoAgent, PpoConfig, TrainConfig, TrainHooks, TrainSummary};

/// Pseudo-random number generator type used by this crate.
pub type Prng = rand_chacha::ChaCha8Rng;
