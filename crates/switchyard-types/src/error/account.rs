//! Credential resolution errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while resolving an account's access token.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum AccountError {
    /// No credential stored for the account
    #[error("No credential stored for account: {id}")]
    MissingCredential {
        /// Unique identifier of the account
        id: String,
    },

    /// Token is expiring and there is no refresh token to renew it
    #[error("Token expired for account {id} and no refresh token is available")]
    TokenExpired {
        /// Unique identifier of the account with expired token
        id: String,
    },

    /// OAuth token endpoint refused or failed the refresh
    #[error("Failed to refresh token for {id}: {message}")]
    TokenRefreshFailed {
        /// Unique identifier of the account
        id: String,
        /// Details about the refresh failure
        message: String,
    },

    /// Credential storage failed
    #[error("Credential storage error for {id}: {message}")]
    StorageError {
        /// Account whose credential was being read or written
        id: String,
        /// Description of the storage failure
        message: String,
    },
}

impl AccountError {
    /// Account the failure belongs to.
    pub fn account_id(&self) -> &str {
        match self {
            Self::MissingCredential { id }
            | Self::TokenExpired { id }
            | Self::TokenRefreshFailed { id, .. }
            | Self::StorageError { id, .. } => id,
        }
    }

    /// Check if the user has to sign in again to fix this error.
    pub const fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::TokenExpired { .. } | Self::TokenRefreshFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_and_reauth() {
        let refresh =
            AccountError::TokenRefreshFailed { id: "acc-1".to_string(), message: "invalid_grant".to_string() };
        let storage = AccountError::StorageError { id: "acc-2".to_string(), message: "disk".to_string() };

        assert_eq!(refresh.account_id(), "acc-1");
        assert!(refresh.requires_reauth());
        assert_eq!(storage.account_id(), "acc-2");
        assert!(!storage.requires_reauth());
    }
}
