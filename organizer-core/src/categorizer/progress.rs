//! Batch checkpoint progress logging

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Counts completed recipes and logs a checkpoint every `batch_size`
/// completions and at the end
pub struct ProgressTracker {
    total: usize,
    batch_size: usize,
    completed: AtomicUsize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize, batch_size: usize) -> Self {
        Self {
            total,
            batch_size: batch_size.max(1),
            completed: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one completion; returns the running count
    pub fn complete_one(&self) -> usize {
        let current = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if current % self.batch_size == 0 || current == self.total {
            self.log_checkpoint(current);
        }
        current
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Completions per second and estimated seconds remaining
    pub fn rate_and_eta(&self, current: usize) -> (f64, u64) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            current as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(current);
        let eta_secs = if rate > 0.0 {
            (remaining as f64 / rate) as u64
        } else {
            0
        };
        (rate, eta_secs)
    }

    fn log_checkpoint(&self, current: usize) {
        let (rate, eta_secs) = self.rate_and_eta(current);
        let percent = if self.total > 0 {
            current as f64 / self.total as f64 * 100.0
        } else {
            100.0
        };
        tracing::info!(
            progress = format!("{}/{}", current, self.total),
            "Categorization progress: {}/{} ({:.1}%) | Rate: {:.2} recipes/sec | ETA: {}s",
            current,
            self.total,
            percent,
            rate,
            eta_secs
        );
    }
}
