//! Error type
use tch::TchError;
use thiserror::Error;

/// Error from training or running a PPO agent.
#[derive(Error, Debug)]
pub enum PpoError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("environment has {actual} workers but the agent is configured for {expected}")]
    WorkerCountMismatch { expected: usize, actual: usize },
    #[error("observation component {index} has shape {actual:?}, expected {expected:?}")]
    ObservationShape {
        index: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("expected {expected} observation components, got {actual}")]
    ObservationCount { expected: usize, actual: usize },
    #[error("action {action} is not in [0, {num_actions})")]
    InvalidAction { action: i64, num_actions: usize },
    #[error("expected {expected} actions (one per worker), got {actual}")]
    ActionCount { expected: usize, actual: usize },
    #[error("evaluation stats do not contain the score {0:?}")]
    MissingScore(String),
    #[error("torch error")]
    Torch(#[from] TchError),
    #[error("array shape error")]
    Shape(#[from] ndarray::ShapeError),
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("error parsing configuration")]
    Json(#[from] serde_json::Error),
}
