//! Retry policy.
//!
//! [`RetryPolicy::decide`] is a pure transition: given the attempt number
//! and the record that attempt produced, it either schedules another attempt
//! after a delay or declares the record terminal.
//!
//! - Transport failures retry with exponential backoff until `max_attempts`.
//! - Service blocks retry once, after a longer backoff.
//! - Everything else (successes, not-found outcomes, timeouts, adapter
//!   failures) is terminal immediately.

use lookout_core::{FailureKind, ResultRecord, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run another attempt after the delay.
    RetryAfter(Duration),
    /// The record is terminal.
    GiveUp,
}

/// Failure classification and backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    block_multiplier: u32,
    jitter: Duration,
}

impl RetryPolicy {
    /// Build a policy from configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            block_multiplier: config.block_multiplier.max(1),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Set the maximum number of attempts, including the first.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base and maximum backoff.
    #[must_use]
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Set the upper bound of the random jitter (zero disables it).
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide what follows attempt number `attempt` (1-based).
    #[must_use]
    pub fn decide(&self, attempt: u32, record: &ResultRecord) -> RetryDecision {
        let Some(failure) = record.failure() else {
            return RetryDecision::GiveUp;
        };

        match failure {
            FailureKind::Transport if attempt < self.max_attempts => {
                RetryDecision::RetryAfter(self.backoff(attempt) + self.jitter())
            }
            FailureKind::Blocked if attempt == 1 && self.max_attempts > 1 => {
                RetryDecision::RetryAfter(self.block_backoff(attempt) + self.jitter())
            }
            _ => RetryDecision::GiveUp,
        }
    }

    /// Backoff after a transport failure on `attempt`, without jitter.
    ///
    /// `base * 2^(attempt - 1)`, capped at the maximum delay.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }

    /// Backoff after a service block on `attempt`, without jitter.
    #[must_use]
    pub fn block_backoff(&self, attempt: u32) -> Duration {
        self.backoff(attempt).saturating_mul(self.block_multiplier)
    }

    /// Build the terminal record from the last attempt's record.
    ///
    /// The result covers every attempt: `elapsed` and `attempts` are
    /// replaced, and a transport failure that used up every attempt becomes
    /// an [`FailureKind::Exhausted`] failure naming the last error.
    #[must_use]
    pub fn conclude(&self, last: ResultRecord, attempts: u32, elapsed: Duration) -> ResultRecord {
        let record = if last.failure() == Some(FailureKind::Transport) && attempts >= self.max_attempts
        {
            let reason = format!(
                "gave up after {attempts} attempts: {}",
                last.error().unwrap_or("transport failure")
            );
            let exhausted = ResultRecord::failed(
                last.service().clone(),
                last.query(),
                last.query_kind(),
                FailureKind::Exhausted,
                reason,
            );
            match last.status_code() {
                Some(status) => exhausted.with_status(status),
                None => exhausted,
            }
        } else {
            last
        };

        record.with_attempts(attempts).with_elapsed(elapsed)
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
