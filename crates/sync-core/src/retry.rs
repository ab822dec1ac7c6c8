//! Retry and reconnect delay policy.
//!
//! Delivery attempts are numbered from 1. The first attempt runs
//! immediately; attempt `n` waits `base * 2^(n-2)` beforehand, capped.
//! The same doubling curve drives source reconnect backoff, where there
//! is no attempt ceiling.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff policy with a hard cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub base: Duration,
    /// Upper bound on any single delay, applied before jitter.
    pub cap: Duration,
    /// Total delivery attempts per event, including the first.
    pub max_attempts: u32,
    /// Whether to stretch each delay by a random factor in [1.0, 1.5).
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
            jitter: false,
        }
    }

    /// Enable random delay stretching. Off in tests so timings are exact.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn exponential(&self, doublings: u32) -> Duration {
        let millis = self
            .base
            .as_millis()
            .saturating_mul(1u128 << doublings.min(32));
        let capped = millis.min(self.cap.as_millis()) as u64;
        let delay = Duration::from_millis(capped);
        if self.jitter {
            delay.mul_f64(rand::rng().random_range(1.0..1.5))
        } else {
            delay
        }
    }

    /// Delay to wait before delivery attempt `attempt` (1-based).
    ///
    /// `None` means the attempt is past the ceiling and the caller gives up.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        if attempt == 1 {
            return Some(Duration::ZERO);
        }
        Some(self.exponential(attempt - 2))
    }

    /// Delay after `failures` consecutive reconnect failures (1-based).
    ///
    /// Reconnects never give up, so this has no ceiling.
    pub fn reconnect_delay(&self, failures: u32) -> Duration {
        self.exponential(failures.saturating_sub(1))
    }
}
