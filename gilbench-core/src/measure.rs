//! Wall-clock timing
//!
//! Every strategy is timed with the same boundary: the timer starts right
//! before dispatch (loop start, thread or process creation) and stops after
//! the last output has been collected and re-ordered, teardown included.

use std::time::{Duration, Instant};

/// Monotonic wall-clock timer for one strategy invocation
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since `start`
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time, never reported as exactly zero.
    ///
    /// A zero duration is reserved for empty batches.
    #[inline(always)]
    pub fn stop(&self) -> Duration {
        self.elapsed().max(Duration::from_nanos(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_elapsed() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed();

        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_stop_is_never_zero() {
        let timer = Timer::start();
        assert!(timer.stop() > Duration::ZERO);
    }
}
