//! Reconnect backoff with multiplicative jitter

use rand::Rng;
use std::time::Duration;

/// Delay between reconnect attempts
///
/// Each failure multiplies the delay by a factor drawn from `[1, 2]`, capped
/// at `max`. Resume and identify attempts share the counter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            failures: 0,
        }
    }

    /// Delay before the next attempt, using the thread-local RNG
    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    /// Delay before the next attempt, using the given RNG
    pub fn next_delay_with<R: Rng>(&mut self, rng: &mut R) -> Duration {
        let factor: f64 = rng.gen_range(1.0..=2.0);
        self.current = self.current.mul_f64(factor).min(self.max);
        self.failures = self.failures.saturating_add(1);
        self.current
    }

    /// Back to the baseline after a stable connection
    pub fn reset(&mut self) {
        self.current = self.base;
        self.failures = 0;
    }

    /// Consecutive failures since the last reset
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }
}
