//! Candidate ordering for one request.

use dashmap::DashMap;
use std::sync::Arc;
use switchyard_types::Account;

use super::quota::{quota_key, QuotaStateManager};

/// Inputs that come from settings rather than the account pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionPrefs<'a> {
    /// Sticky account for this model, learned from an earlier failover
    pub assigned: Option<&'a str>,
    /// Provider-wide active account from settings
    pub active: Option<&'a str>,
    pub load_balancing: bool,
}

pub struct AccountSelector {
    quota: Arc<QuotaStateManager>,
    /// `provider:model` -> account used last
    last_used: DashMap<String, String>,
}

fn rotation_key(provider: &str, model: &str) -> String {
    format!("{}:{}", provider, model)
}

/// Explicitly preferred account: default flag first, then the active one.
fn explicit_default<'a>(pool: &'a [Account], active: Option<&str>) -> Option<&'a Account> {
    pool.iter()
        .find(|a| a.is_default)
        .or_else(|| active.and_then(|id| pool.iter().find(|a| a.id == id)))
}

fn move_to_front(candidates: &mut Vec<Account>, id: &str) {
    if let Some(pos) = candidates.iter().position(|a| a.id == id) {
        let account = candidates.remove(pos);
        candidates.insert(0, account);
    }
}

impl AccountSelector {
    pub fn new(quota: Arc<QuotaStateManager>) -> Self {
        Self { quota, last_used: DashMap::new() }
    }

    /// Ordered candidates for `model`. Never empty unless `accounts` is.
    pub fn select(
        &self,
        provider: &str,
        model: &str,
        accounts: &[Account],
        prefs: SelectionPrefs<'_>,
    ) -> Vec<Account> {
        if accounts.is_empty() {
            return Vec::new();
        }

        let active: Vec<Account> = accounts.iter().filter(|a| a.is_active()).cloned().collect();
        let mut pool = if active.is_empty() { accounts.to_vec() } else { active };
        pool.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        if !prefs.load_balancing {
            let chosen = prefs
                .assigned
                .and_then(|id| pool.iter().find(|a| a.id == id))
                .or_else(|| explicit_default(&pool, prefs.active))
                .or_else(|| pool.first())
                .cloned();
            return chosen.into_iter().collect();
        }

        // Continue the round-robin after whichever account went last.
        let mut ordered = pool.clone();
        if let Some(last) = self.last_used.get(&rotation_key(provider, model)) {
            if let Some(pos) = ordered.iter().position(|a| a.id == *last) {
                ordered.rotate_left(pos + 1);
            }
        }

        let head = prefs
            .assigned
            .filter(|id| ordered.iter().any(|a| a.id == *id))
            .map(str::to_string)
            .or_else(|| explicit_default(&pool, prefs.active).map(|a| a.id.clone()));
        if let Some(head) = head {
            move_to_front(&mut ordered, &head);
        }

        let available: Vec<Account> = ordered
            .iter()
            .filter(|a| !self.quota.is_in_cooldown(&quota_key(&a.id, model)))
            .cloned()
            .collect();
        if available.is_empty() {
            tracing::debug!(
                "[Selector] Every {} account is cooling down for {}, keeping full order",
                provider,
                model
            );
            return ordered;
        }
        available
    }

    /// Remember the account that served `model` so the next selection
    /// continues after it.
    pub fn record_used(&self, provider: &str, model: &str, account_id: &str) {
        self.last_used.insert(rotation_key(provider, model), account_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::clock::ManualClock;
    use switchyard_types::AccountStatus;

    fn pool() -> Vec<Account> {
        // Deliberately out of creation order.
        vec![
            Account::new("C", "claude", 3),
            Account::new("A", "claude", 1),
            Account::new("B", "claude", 2),
        ]
    }

    fn ids(accounts: &[Account]) -> Vec<&str> {
        accounts.iter().map(|a| a.id.as_str()).collect()
    }

    fn selector() -> (AccountSelector, Arc<QuotaStateManager>) {
        let quota = Arc::new(QuotaStateManager::new(Arc::new(ManualClock::new(0)), 1_000, 60_000));
        (AccountSelector::new(quota.clone()), quota)
    }

    const LB: SelectionPrefs<'static> =
        SelectionPrefs { assigned: None, active: None, load_balancing: true };

    #[test]
    fn test_rotation_continues_after_last_used() {
        let (s, _) = selector();
        assert_eq!(ids(&s.select("claude", "m", &pool(), LB)), ["A", "B", "C"]);

        s.record_used("claude", "m", "B");
        assert_eq!(ids(&s.select("claude", "m", &pool(), LB)), ["C", "A", "B"]);

        // Rotation is per model.
        assert_eq!(ids(&s.select("claude", "other", &pool(), LB)), ["A", "B", "C"]);
    }

    #[test]
    fn test_sticky_assignment_leads() {
        let (s, _) = selector();
        s.record_used("claude", "m", "B");
        let prefs = SelectionPrefs { assigned: Some("A"), ..LB };
        assert_eq!(ids(&s.select("claude", "m", &pool(), prefs)), ["A", "C", "B"]);

        let prefs = SelectionPrefs { active: Some("B"), ..LB };
        assert_eq!(ids(&s.select("claude", "m", &pool(), prefs)), ["B", "C", "A"]);
    }

    #[test]
    fn test_fixed_candidate_without_load_balancing() {
        let (s, quota) = selector();
        quota.mark_exceeded(&quota_key("B", "m"), Some(60_000));
        let prefs = SelectionPrefs { assigned: Some("B"), active: Some("C"), load_balancing: false };
        assert_eq!(ids(&s.select("claude", "m", &pool(), prefs)), ["B"]);

        let prefs = SelectionPrefs { active: Some("C"), load_balancing: false, ..Default::default() };
        assert_eq!(ids(&s.select("claude", "m", &pool(), prefs)), ["C"]);

        let prefs = SelectionPrefs::default();
        assert_eq!(ids(&s.select("claude", "m", &pool(), prefs)), ["A"]);

        let mut accounts = pool();
        accounts[0].is_default = true;
        assert_eq!(ids(&s.select("claude", "m", &accounts, prefs)), ["C"]);
    }

    #[test]
    fn test_cooldown_filter_with_fallback() {
        let (s, quota) = selector();
        quota.mark_exceeded(&quota_key("A", "m"), None);
        assert_eq!(ids(&s.select("claude", "m", &pool(), LB)), ["B", "C"]);

        quota.mark_exceeded(&quota_key("B", "m"), None);
        quota.mark_exceeded(&quota_key("C", "m"), None);
        assert_eq!(ids(&s.select("claude", "m", &pool(), LB)), ["A", "B", "C"]);
    }

    #[test]
    fn test_disabled_accounts_skipped_unless_all_disabled() {
        let (s, _) = selector();
        let mut accounts = pool();
        accounts[1].status = AccountStatus::Disabled;
        assert_eq!(ids(&s.select("claude", "m", &accounts, LB)), ["B", "C"]);

        for a in &mut accounts {
            a.status = AccountStatus::Disabled;
        }
        assert_eq!(ids(&s.select("claude", "m", &accounts, LB)), ["A", "B", "C"]);
        assert!(s.select("claude", "m", &[], LB).is_empty());
    }
}
