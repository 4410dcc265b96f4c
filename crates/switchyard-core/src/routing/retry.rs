//! Bounded in-place retry for a single logical request.

use std::time::Duration;
use switchyard_types::RoutingConfig;
use tokio_util::sync::CancellationToken;

use super::parser::parse_retry_hint_ms;
use crate::utils::cancel::{sleep_or_cancel, SleepOutcome};

/// Result of asking the policy to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryWait {
    /// Slept for the given delay; try again.
    Retry(Duration),
    /// Attempt budget used up.
    Exhausted,
    /// Caller cancelled during the wait.
    Cancelled,
}

/// Retry counter and delay computation, one per request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempt: u32,
    max_attempts: u32,
    base_ms: u64,
    max_delay_ms: u64,
    hint_buffer_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_ms: u64, max_delay_ms: u64, hint_buffer_ms: u64) -> Self {
        Self { attempt: 0, max_attempts, base_ms, max_delay_ms, hint_buffer_ms }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            config.retry_base_ms,
            config.retry_max_delay_ms,
            config.retry_hint_buffer_ms,
        )
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Delay before the next attempt: exponential backoff unless the failure
    /// body carries a server directive, which (plus a buffer) overrides it.
    /// Always capped.
    pub fn compute_delay(&self, failure_body: Option<&str>) -> Duration {
        if let Some(hint_ms) = failure_body.and_then(parse_retry_hint_ms) {
            let delay = hint_ms.saturating_add(self.hint_buffer_ms).min(self.max_delay_ms);
            return Duration::from_millis(delay);
        }
        let factor = 1_u64.checked_shl(self.attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// Sleep out the next delay and count the attempt.
    pub async fn wait(&mut self, failure_body: Option<&str>, cancel: &CancellationToken) -> RetryWait {
        if !self.can_retry() {
            return RetryWait::Exhausted;
        }
        let delay = self.compute_delay(failure_body);
        self.attempt += 1;
        tracing::debug!(
            "[Retry] Attempt {}/{} in {}ms",
            self.attempt,
            self.max_attempts,
            delay.as_millis()
        );
        match sleep_or_cancel(delay, cancel).await {
            SleepOutcome::Completed => RetryWait::Retry(delay),
            SleepOutcome::Cancelled => RetryWait::Cancelled,
        }
    }
}
