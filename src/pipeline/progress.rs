// src/pipeline/progress.rs
//
// Cooperative cancellation and coarse progress for long-running jobs. The
// cancel flag is checked once per frame; progress is reported at a bounded
// frame interval so a supervisor is not spammed on every iteration.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

pub struct ProgressReporter {
    total_frames: u64,
    interval: u64,
    processed: Arc<AtomicU64>,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(total_frames: u64, interval: u64) -> Self {
        Self {
            total_frames,
            interval: interval.max(1),
            processed: Arc::new(AtomicU64::new(0)),
            started: Instant::now(),
        }
    }

    /// Count one processed frame; logs at the configured interval only.
    pub fn record(&self, frame_index: u64) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % self.interval == 0 {
            let percent = if self.total_frames > 0 {
                processed as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            };
            info!(
                "Progress: {:.1}% ({}/{}) at frame {} | {:.1} fps",
                percent,
                processed,
                self.total_frames,
                frame_index,
                self.fps()
            );
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            self.processed() as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Per-video summary printed at the end of a session.
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub frames_processed: u64,
    pub measurements_written: u64,
    pub tracked_observations: u64,
    pub predicted_observations: u64,
    pub lost_observations: u64,
    pub duration_secs: f64,
    pub avg_fps: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_progress_counts() {
        let progress = ProgressReporter::new(100, 10);
        for frame in 0..25u64 {
            progress.record(frame);
        }
        assert_eq!(progress.processed(), 25);
    }
}
