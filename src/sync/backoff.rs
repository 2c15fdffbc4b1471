use std::time::Duration;

use crate::BackoffPolicy;

/// Consecutive-failure counter on top of a [`BackoffPolicy`]
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay after one more transient failure.
    pub(crate) fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.policy.delay_for(self.attempt)
    }

    /// Delay after a failure that retrying soon will not fix.
    ///
    /// Does not count as an attempt.
    pub(crate) fn ceiling(&self) -> Duration {
        self.policy.max_delay()
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }
}
