//! Model checkpoints
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Path of a checkpoint file named `name` in `dir` (or the working directory).
pub fn checkpoint_path(name: &str, dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Create the parent directory of a checkpoint path if it does not exist.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Best evaluation score seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestScore {
    pub high_is_better: bool,
    /// Starts at the worst possible score.
    pub best: f64,
}

impl BestScore {
    pub const fn new(high_is_better: bool) -> Self {
        Self {
            high_is_better,
            best: if high_is_better {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            },
        }
    }

    /// Whether `score` is at least as good as the best so far. Ties count as improvements.
    pub fn is_improvement(&self, score: f64) -> bool {
        if self.high_is_better {
            score >= self.best
        } else {
            score <= self.best
        }
    }

    /// Record `score` if it is an improvement.
    ///
    /// # Returns
    /// Whether it was an improvement.
    pub fn update(&mut self, score: f64) -> bool {
        let improved = self.is_improvement(score);
        if improved {
            self.best = score;
        }
        improved
    }

    /// The best score, if any score has been recorded.
    pub fn get(&self) -> Option<f64> {
        if self.best.is_finite() {
            Some(self.best)
        } else {
            None
        }
    }
}
