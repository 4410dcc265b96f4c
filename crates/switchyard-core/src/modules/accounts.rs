//! Account repository seam.

use async_trait::async_trait;
use parking_lot::RwLock;
use switchyard_types::Account;

pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Account not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Read access to the account pool. Accounts are owned by the host.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn list_accounts(&self, provider: &str) -> RepoResult<Vec<Account>>;
}

#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: RwLock<Vec<Account>>,
}

impl MemoryAccountRepository {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts: RwLock::new(accounts) }
    }

    pub fn upsert(&self, account: Account) {
        let mut accounts = self.accounts.write();
        match accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account,
            None => accounts.push(account),
        }
    }

    pub fn remove(&self, account_id: &str) -> RepoResult<()> {
        let mut accounts = self.accounts.write();
        let before = accounts.len();
        accounts.retain(|a| a.id != account_id);
        if accounts.len() == before {
            return Err(RepositoryError::NotFound(account_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn list_accounts(&self, provider: &str) -> RepoResult<Vec<Account>> {
        Ok(self.accounts.read().iter().filter(|a| a.provider == provider).cloned().collect())
    }
}
