//! Routing settings surface.
//!
//! The load-balancing toggle, the active account, and the per-model sticky
//! assignment are plain values in an externally owned settings surface.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::store::{SharedStore, StoreResult};

#[async_trait]
pub trait RoutingSettings: Send + Sync {
    async fn load_balancing_enabled(&self, provider: &str) -> bool;
    async fn active_account(&self, provider: &str) -> Option<String>;
    async fn assigned_account(&self, provider: &str, model: &str) -> Option<String>;
    async fn set_assigned_account(
        &self,
        provider: &str,
        model: &str,
        account_id: &str,
    ) -> StoreResult<()>;
}

/// Settings kept as keys in a [`SharedStore`], so every instance sees the
/// same assignments:
///
/// - `settings.<provider>.load_balancing` -> bool
/// - `settings.<provider>.active_account` -> string
/// - `settings.<provider>.assigned.<model>` -> string
pub struct StoreRoutingSettings {
    store: Arc<dyn SharedStore>,
}

impl StoreRoutingSettings {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub async fn set_load_balancing(&self, provider: &str, enabled: bool) -> StoreResult<()> {
        self.store.set(&load_balancing_key(provider), Value::Bool(enabled)).await
    }

    pub async fn set_active_account(&self, provider: &str, account_id: &str) -> StoreResult<()> {
        self.store.set(&active_account_key(provider), Value::String(account_id.to_string())).await
    }

    async fn read_string(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(Some(Value::String(s))) if !s.is_empty() => Some(s),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("[Settings] Failed to read '{}': {}", key, e);
                None
            },
        }
    }
}

fn load_balancing_key(provider: &str) -> String {
    format!("settings.{}.load_balancing", provider)
}

fn active_account_key(provider: &str) -> String {
    format!("settings.{}.active_account", provider)
}

fn assigned_key(provider: &str, model: &str) -> String {
    format!("settings.{}.assigned.{}", provider, model)
}

#[async_trait]
impl RoutingSettings for StoreRoutingSettings {
    async fn load_balancing_enabled(&self, provider: &str) -> bool {
        match self.store.get(&load_balancing_key(provider)).await {
            Ok(Some(Value::Bool(enabled))) => enabled,
            Ok(_) => false,
            Err(e) => {
                tracing::warn!("[Settings] Failed to read load balancing toggle: {}", e);
                false
            },
        }
    }

    async fn active_account(&self, provider: &str) -> Option<String> {
        self.read_string(&active_account_key(provider)).await
    }

    async fn assigned_account(&self, provider: &str, model: &str) -> Option<String> {
        self.read_string(&assigned_key(provider, model)).await
    }

    async fn set_assigned_account(
        &self,
        provider: &str,
        model: &str,
        account_id: &str,
    ) -> StoreResult<()> {
        self.store
            .set(&assigned_key(provider, model), Value::String(account_id.to_string()))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::store::MemoryStore;

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let settings = StoreRoutingSettings::new(Arc::new(MemoryStore::new()));
        assert!(!settings.load_balancing_enabled("claude").await);
        assert!(settings.active_account("claude").await.is_none());
        assert!(settings.assigned_account("claude", "opus").await.is_none());
    }

    #[tokio::test]
    async fn test_assignment_is_per_provider_and_model() {
        let settings = StoreRoutingSettings::new(Arc::new(MemoryStore::new()));
        settings.set_load_balancing("claude", true).await.unwrap();
        settings.set_assigned_account("claude", "opus", "acc-2").await.unwrap();

        assert!(settings.load_balancing_enabled("claude").await);
        assert!(!settings.load_balancing_enabled("gemini").await);
        assert_eq!(settings.assigned_account("claude", "opus").await.as_deref(), Some("acc-2"));
        assert!(settings.assigned_account("claude", "sonnet").await.is_none());
    }
}
