//! Cancellable sleeps.
//!
//! Every suspension point that a caller can abort goes through
//! [`sleep_or_cancel`]. The timer future is owned by the `select!` and is
//! dropped as soon as either side resolves, so a cancelled wait never leaves
//! a pending timer behind.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a cancellable sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Completed,
    Cancelled,
}

impl SleepOutcome {
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> SleepOutcome {
    if cancel.is_cancelled() {
        return SleepOutcome::Cancelled;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => SleepOutcome::Cancelled,
        () = tokio::time::sleep(duration) => SleepOutcome::Completed,
    }
}
