//! Per-operation latency accumulation

use std::time::Duration;

/// Cumulative duration and count of successful probed operations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateAccumulator {
    duration: Duration,
    count: u64,
}

impl RateAccumulator {
    pub const fn new() -> Self {
        Self { duration: Duration::ZERO, count: 0 }
    }

    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        self.duration += elapsed;
        self.count += 1;
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn total(&self) -> Duration {
        self.duration
    }

    /// Mean time per operation, or `None` before the first operation.
    pub fn mean(&self) -> Option<Duration> {
        (self.count > 0)
            .then(|| Duration::from_nanos((self.duration.as_nanos() / u128::from(self.count)) as u64))
    }

    /// Mean nanoseconds per operation; 0.0 when nothing was recorded.
    pub fn nanos_per_op(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.duration.as_nanos() as f64 / self.count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rate_is_zero() {
        let r = RateAccumulator::new();
        assert_eq!(r.count(), 0);
        assert_eq!(r.mean(), None);
        assert_eq!(r.nanos_per_op(), 0.0);
    }

    #[test]
    fn mean_over_samples() {
        let mut r = RateAccumulator::new();
        r.record(Duration::from_nanos(100));
        r.record(Duration::from_nanos(300));
        assert_eq!(r.count(), 2);
        assert_eq!(r.total(), Duration::from_nanos(400));
        assert_eq!(r.nanos_per_op(), 200.0);
        assert_eq!(r.mean(), Some(Duration::from_nanos(200)));
    }
}
