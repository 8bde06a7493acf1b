//! [`Rate`] – fixed-frequency loop pacing.

use std::time::{Duration, Instant};

/// Sleeps away whatever is left of each period.
///
/// Deadlines advance by exactly one period per cycle, so short jitter does
/// not accumulate.  When a cycle overruns its deadline the schedule restarts
/// from the current instant instead of trying to catch up.
#[derive(Debug, Clone)]
pub struct Rate {
    period: Duration,
    next: Instant,
}

impl Rate {
    /// A rate of `hz` cycles per second.  Zero is treated as one.
    pub fn new(hz: u32) -> Self {
        Self::with_period(Duration::from_secs(1) / hz.max(1))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left until the current deadline, zero if it has passed.
    pub fn remaining(&self) -> Duration {
        self.next.saturating_duration_since(Instant::now())
    }

    /// Block until the current deadline.  Returns `false` when the cycle
    /// overran and no sleep happened.
    pub fn sleep(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next {
            self.next = now + self.period;
            return false;
        }
        std::thread::sleep(self.next - now);
        self.next += self.period;
        true
    }

    /// Restart the schedule from now.
    pub fn reset(&mut self) {
        self.next = Instant::now() + self.period;
    }
}
