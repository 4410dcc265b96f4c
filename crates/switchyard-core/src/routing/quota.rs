//! Per `account:model` quota cooldowns.
//!
//! Private to this instance. Expired entries clear themselves on the next
//! query, so no background sweep is needed.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{QuotaCooldown, RoutingConfig};

use crate::coordination::clock::Clock;

/// Cooldown key for an account and model.
pub fn quota_key(account_id: &str, model: &str) -> String {
    format!("{}:{}", account_id, model)
}

#[derive(Debug, Clone, Default)]
struct QuotaEntry {
    is_exhausted: bool,
    next_recover_at: i64,
    backoff_level: u32,
    last_error: Option<String>,
}

pub struct QuotaStateManager {
    entries: DashMap<String, QuotaEntry>,
    clock: Arc<dyn Clock>,
    base_ms: u64,
    cap_ms: u64,
}

impl QuotaStateManager {
    pub fn new(clock: Arc<dyn Clock>, base_ms: u64, cap_ms: u64) -> Self {
        Self { entries: DashMap::new(), clock, base_ms, cap_ms }
    }

    pub fn from_config(clock: Arc<dyn Clock>, config: &RoutingConfig) -> Self {
        Self::new(clock, config.cooldown_base_ms, config.cooldown_cap_ms)
    }

    /// `min(base * 2^level, cap)`.
    fn backoff_ms(&self, level: u32) -> u64 {
        let factor = 1_u64.checked_shl(level).unwrap_or(u64::MAX);
        self.base_ms.saturating_mul(factor).min(self.cap_ms)
    }

    /// Start (or extend) a cooldown. A server hint longer than the computed
    /// backoff wins. Returns the cooldown applied.
    pub fn mark_exceeded(&self, key: &str, retry_hint_ms: Option<u64>) -> Duration {
        self.mark_exceeded_with_reason(key, retry_hint_ms, None)
    }

    pub fn mark_exceeded_with_reason(
        &self,
        key: &str,
        retry_hint_ms: Option<u64>,
        reason: Option<&str>,
    ) -> Duration {
        let now = self.clock.now_millis();
        let mut entry = self.entries.entry(key.to_string()).or_default();

        let computed = self.backoff_ms(entry.backoff_level);
        let cooldown_ms = retry_hint_ms.map_or(computed, |hint| hint.max(computed));

        entry.is_exhausted = true;
        entry.next_recover_at = now.saturating_add(i64::try_from(cooldown_ms).unwrap_or(i64::MAX));
        entry.backoff_level = entry.backoff_level.saturating_add(1);
        if let Some(reason) = reason {
            entry.last_error = Some(reason.to_string());
        }

        tracing::info!(
            "[Quota] {} cooling down for {}ms (level {}{})",
            key,
            cooldown_ms,
            entry.backoff_level,
            if retry_hint_ms.is_some() { ", server hint" } else { "" }
        );
        Duration::from_millis(cooldown_ms)
    }

    /// Forget any cooldown and reset the backoff level.
    pub fn clear_exceeded(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            tracing::debug!("[Quota] {} recovered, backoff reset", key);
        }
    }

    pub fn is_in_cooldown(&self, key: &str) -> bool {
        self.remaining_cooldown(key) > Duration::ZERO
    }

    /// Time until `key` is usable again; zero when not cooling down.
    ///
    /// A cooldown that has run out is dropped here, which also resets its
    /// backoff level.
    pub fn remaining_cooldown(&self, key: &str) -> Duration {
        let now = self.clock.now_millis();
        let remaining = match self.entries.get(key) {
            None => return Duration::ZERO,
            Some(entry) if entry.is_exhausted && now < entry.next_recover_at => {
                Duration::from_millis((entry.next_recover_at - now) as u64)
            },
            Some(_) => Duration::ZERO,
        };
        if remaining.is_zero()
            && self
                .entries
                .remove_if(key, |_, e| !e.is_exhausted || now >= e.next_recover_at)
                .is_some()
        {
            tracing::debug!("[Quota] {} cooldown expired, backoff reset", key);
        }
        remaining
    }

    pub fn backoff_level(&self, key: &str) -> u32 {
        self.entries.get(key).map_or(0, |e| e.backoff_level)
    }

    /// Live cooldowns, soonest recovery first.
    pub fn snapshot(&self) -> Vec<QuotaCooldown> {
        let now = self.clock.now_millis();
        let mut items: Vec<QuotaCooldown> = self
            .entries
            .iter()
            .filter(|e| e.is_exhausted && now < e.next_recover_at)
            .map(|e| QuotaCooldown {
                key: e.key().clone(),
                is_exhausted: true,
                next_recover_at: e.next_recover_at,
                backoff_level: e.backoff_level,
                last_error: e.last_error.clone(),
            })
            .collect();
        items.sort_by_key(|c| c.next_recover_at);
        items
    }

    /// Drop entries whose cooldown has passed. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_exhausted && now < e.next_recover_at);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!("[Quota] Cleaned up {} expired cooldowns", removed);
        }
        removed
    }
}
