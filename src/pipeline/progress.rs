//! Per-file progress reporting

use std::time::{Duration, Instant};

/// Counts processed tick files and logs progress with an ETA
#[derive(Debug)]
pub struct Progress {
    stream: &'static str,
    total: usize,
    done: usize,
    rows: u64,
    started: Instant,
}

impl Progress {
    pub fn new(stream: &'static str, total: usize) -> Self {
        Self {
            stream,
            total,
            done: 0,
            rows: 0,
            started: Instant::now(),
        }
    }

    /// Record one finished file
    pub fn advance(&mut self, file: &str, rows: u64) {
        self.done += 1;
        self.rows += rows;
        let eta = estimate_remaining(self.started.elapsed(), self.done, self.total);
        tracing::info!(
            stream = self.stream,
            file,
            done = self.done,
            total = self.total,
            rows = self.rows,
            eta_secs = eta.as_secs(),
            "Processed tick file"
        );
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Linear extrapolation of the remaining time from the mean time per item
pub fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> Duration {
    if done == 0 || done >= total {
        return Duration::ZERO;
    }
    let per_item = elapsed / done as u32;
    per_item * (total - done) as u32
}
