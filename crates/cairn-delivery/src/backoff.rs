//! Jittered exponential backoff.
//!
//! Both worker loops retry with this: the transmit loop at a short range
//! (latency is a priority), the delete loop at a long one (storage faults
//! are rare and slow to clear). Jitter keeps retries from synchronizing
//! across nodes that fail at the same instant.

use std::time::Duration;

use rand::Rng;

#[derive(Debug)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            attempt: 0,
        }
    }

    /// Next wait interval: uniform in `[min, min * 2^attempt]`, capped at
    /// `max`. The first call after construction or [`reset`](Self::reset)
    /// returns exactly `min`.
    pub fn next(&mut self) -> Duration {
        let ceiling = self
            .min
            .checked_mul(1u32.checked_shl(self.attempt).unwrap_or(u32::MAX))
            .unwrap_or(self.max)
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        if ceiling <= self.min {
            return self.min;
        }
        self.min + (ceiling - self.min).mul_f64(rand::thread_rng().gen::<f64>())
    }

    /// Return to the floor. Called after any successful attempt.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// A duration jittered uniformly within ±10%.
///
/// Applied to the per-attempt transmit timeout so that nodes which popped
/// the same report at the same moment do not retry in lockstep.
pub fn with_jitter(d: Duration) -> Duration {
    d.mul_f64(0.9 + 0.2 * rand::thread_rng().gen::<f64>())
}
