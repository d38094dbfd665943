//! Stall detection
//!
//! Tracks the instant of last forward progress. The controller arms a check after
//! a waiting/stalled signal; when it fires, the verdict decides whether recovery
//! is needed.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallVerdict {
    /// User paused; not a stall
    Paused,

    /// Progress happened within the threshold
    Progressed,

    /// No progress for at least the threshold
    Stalled,
}

#[derive(Debug, Clone)]
pub struct StallDetector {
    last_progress: Instant,
    threshold: Duration,
}

impl StallDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            last_progress: Instant::now(),
            threshold,
        }
    }

    /// Time update, seek completion or resume from buffering
    pub fn mark_progress(&mut self) {
        self.last_progress = Instant::now();
    }

    pub fn since_progress(&self) -> Duration {
        self.last_progress.elapsed()
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn evaluate(&self, paused: bool) -> StallVerdict {
        if paused {
            StallVerdict::Paused
        } else if self.since_progress() < self.threshold {
            StallVerdict::Progressed
        } else {
            StallVerdict::Stalled
        }
    }
}
