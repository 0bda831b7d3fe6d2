//! Training progress bookkeeping
use crate::utils::stats::median;
use std::collections::VecDeque;
use std::time::Duration;

/// Running reward of each worker's current episode and its most recently finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRewards {
    /// Reward accumulated in the current episode.
    episode: Vec<f64>,
    /// Total reward of the last finished episode (0 before any episode finishes).
    last: Vec<f64>,
}

impl EpisodeRewards {
    pub fn new(num_workers: usize) -> Self {
        Self {
            episode: vec![0.0; num_workers],
            last: vec![0.0; num_workers],
        }
    }

    /// Record one step of rewards and episode ends (`dones`) for every worker.
    pub fn push_step(&mut self, rewards: &[f32], dones: &[bool]) {
        for (((episode, last), &reward), &done) in self
            .episode
            .iter_mut()
            .zip(&mut self.last)
            .zip(rewards)
            .zip(dones)
        {
            *episode += f64::from(reward);
            if done {
                *last = *episode;
                *episode = 0.0;
            }
        }
    }

    /// Total reward of each worker's last finished episode.
    pub fn final_rewards(&self) -> &[f64] {
        &self.last
    }

    pub fn mean(&self) -> f64 {
        if self.last.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.last.len() as f64;
        self.last.iter().sum::<f64>() / n
    }

    pub fn median(&self) -> f64 {
        median(&self.last).unwrap_or(0.0)
    }
}

/// Number of recent updates averaged by [`UpdateRate`].
const UPDATE_RATE_WINDOW: usize = 11;

/// Updates per second averaged over a window of recent update durations.
///
/// The window starts filled with 1 second durations.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRate {
    durations: VecDeque<Duration>,
}

impl Default for UpdateRate {
    fn default() -> Self {
        Self {
            durations: std::iter::repeat(Duration::from_secs(1))
                .take(UPDATE_RATE_WINDOW)
                .collect(),
        }
    }
}

impl UpdateRate {
    pub fn push(&mut self, duration: Duration) {
        self.durations.pop_front();
        self.durations.push_back(duration);
    }

    pub fn updates_per_second(&self) -> f64 {
        let total: Duration = self.durations.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total.as_secs_f64() / self.durations.len() as f64;
        if mean > 0.0 {
            mean.recip()
        } else {
            f64::INFINITY
        }
    }
}
