//! Fixed-rate frame pacing.

use std::thread;
use std::time::{Duration, Instant};

/// Sleeps so that tick `n` ends at `start + n / fps`.
///
/// Deadlines are measured from a fixed start rather than from the previous
/// tick, so per-iteration jitter does not accumulate.
#[derive(Debug)]
pub struct FramePacer {
    start: Instant,
    interval: Duration,
    ticks: u64,
}

impl FramePacer {
    /// Start pacing now. `fps` must be positive.
    pub fn new(fps: u32) -> Self {
        Self {
            start: Instant::now(),
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            ticks: 0,
        }
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Deadline of the tick in progress.
    pub fn next_deadline(&self) -> Instant {
        self.start + self.interval.mul_f64((self.ticks + 1) as f64)
    }

    /// Finish the current tick, sleeping out whatever is left of it.
    /// Returns immediately when running behind.
    pub fn wait(&mut self) {
        let deadline = self.next_deadline();
        self.ticks += 1;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_within_five_percent() {
        let frames = 30;
        let start = Instant::now();
        let mut pacer = FramePacer::new(30);
        for _ in 0..frames {
            pacer.wait();
        }
        let elapsed = start.elapsed().as_secs_f64();
        let expected = frames as f64 / 30.0;
        assert!(
            (elapsed - expected).abs() <= expected * 0.05,
            "elapsed {elapsed:.3}s, expected {expected:.3}s"
        );
        assert_eq!(pacer.ticks(), frames);
    }

    #[test]
    fn test_slow_iterations_do_not_accumulate_drift() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(50);
        for i in 0..20 {
            if i % 5 == 0 {
                // One slow iteration every five ticks; later ticks catch up.
                thread::sleep(Duration::from_millis(30));
            }
            pacer.wait();
        }
        let elapsed = start.elapsed().as_secs_f64();
        assert!(elapsed >= 0.4 * 0.95 && elapsed <= 0.4 * 1.05, "elapsed {elapsed:.3}s");
    }
}
