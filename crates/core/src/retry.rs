//! Retry policy for availability checks
//!
//! Availability checks are re-run by the host scheduler, not by a loop in
//! this process, so the policy only answers two questions: how long to wait
//! before check number `n`, and whether check number `n` may be scheduled at
//! all. There is no backoff; the first check has its own delay and every
//! later check uses a fixed interval.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cadence and bound for availability checks
///
/// # Example
///
/// ```
/// use eventroute_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::unbounded();
///
/// // First check after 5 seconds, then every 10 seconds
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
/// assert!(policy.has_attempts_remaining(1_000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first check
    #[serde(with = "crate::duration_millis")]
    pub first_delay: Duration,

    /// Delay before every later check
    #[serde(with = "crate::duration_millis")]
    pub interval: Duration,

    /// Maximum number of checks; `None` retries indefinitely
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// First check after 5s, then every 10s, no bound
    pub fn unbounded() -> Self {
        Self {
            first_delay: Duration::from_secs(5),
            interval: Duration::from_secs(10),
            max_attempts: None,
        }
    }

    /// Every 10s, at most 6 checks (about one minute)
    pub fn bounded() -> Self {
        Self::fixed(Duration::from_secs(10), 6)
    }

    /// Fixed interval with a bound
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            first_delay: interval,
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    /// Set the delay before the first check
    pub fn with_first_delay(mut self, delay: Duration) -> Self {
        self.first_delay = delay;
        self
    }

    /// Set the delay between later checks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the maximum number of checks
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before check number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            self.first_delay
        } else {
            self.interval
        }
    }

    /// Whether another check may follow check number `current_attempt`
    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => current_attempt < max,
            None => true,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some()
    }
}

impl std::fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "first {}s, every {}s",
            self.first_delay.as_secs(),
            self.interval.as_secs()
        )?;
        match self.max_attempts {
            Some(max) => write!(f, ", at most {max} checks"),
            None => write!(f, ", unbounded"),
        }
    }
}
