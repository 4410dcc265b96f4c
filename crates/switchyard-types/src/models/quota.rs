//! Quota cooldown snapshot.

use serde::{Deserialize, Serialize};

/// Cooldown state for one `account:model` key, as exposed to status surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCooldown {
    /// `accountId:modelId`
    pub key: String,
    pub is_exhausted: bool,
    /// Unix millis when the key becomes usable again
    pub next_recover_at: i64,
    /// Consecutive failures driving the exponential cooldown
    pub backoff_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QuotaCooldown {
    /// Milliseconds left until recovery, 0 once recovered.
    pub fn remaining_ms(&self, now: i64) -> u64 {
        if !self.is_exhausted || now >= self.next_recover_at {
            return 0;
        }
        u64::try_from(self.next_recover_at - now).unwrap_or(0)
    }
}
