use chrono::{DateTime, TimeDelta, Utc};

/// Bounded retry policy for rejected publish attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before a post is moved to `Failed`. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Minimum wait between a rejection and the next attempt.
    pub backoff: TimeDelta,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            backoff: TimeDelta::zero(),
        }
    }
}

impl RetryPolicy {
    /// Retry forever with no backoff.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            backoff: TimeDelta::zero(),
        }
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    pub fn next_attempt_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (self.backoff > TimeDelta::zero()).then(|| now + self.backoff)
    }
}
