//! Credential store seam.

use async_trait::async_trait;
use dashmap::DashMap;
use switchyard_types::{AccountError, Credential};

/// Secure credential storage (keychain, secret service, ...), keyed by account id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, account_id: &str) -> Result<Option<Credential>, AccountError>;
    async fn update(&self, account_id: &str, credential: Credential) -> Result<(), AccountError>;
    async fn delete(&self, account_id: &str) -> Result<(), AccountError>;
}

/// Credential id used when a provider has no accounts configured and the
/// host stored a single out-of-band token instead.
pub fn default_credential_id(provider: &str) -> String {
    format!("default:{}", provider)
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: DashMap<String, Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, account_id: &str) -> Result<Option<Credential>, AccountError> {
        Ok(self.credentials.get(account_id).map(|c| c.value().clone()))
    }

    async fn update(&self, account_id: &str, credential: Credential) -> Result<(), AccountError> {
        self.credentials.insert(account_id.to_string(), credential);
        Ok(())
    }

    async fn delete(&self, account_id: &str) -> Result<(), AccountError> {
        self.credentials.remove(account_id);
        Ok(())
    }
}
