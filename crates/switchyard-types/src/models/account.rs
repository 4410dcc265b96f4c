//! Account model.

use serde::{Deserialize, Serialize};

/// Whether an account may be used for routing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Disabled,
}

/// A credentialed account for one provider.
///
/// Owned by the account store; the router only reads it. Credentials live in
/// the credential store under the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Logical provider this account belongs to (e.g. "claude", "gemini")
    pub provider: String,
    /// Optional display name (usually the email)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Routing status
    #[serde(default)]
    pub status: AccountStatus,
    /// Explicit default account for the provider
    #[serde(default)]
    pub is_default: bool,
    /// Creation timestamp (unix millis), used for deterministic ordering
    pub created_at: i64,
}

impl Account {
    /// Create a new active, non-default account.
    pub fn new(id: impl Into<String>, provider: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            display_name: None,
            status: AccountStatus::Active,
            is_default: false,
            created_at,
        }
    }

    /// Check if the account may be routed to.
    pub const fn is_active(&self) -> bool {
        matches!(self.status, AccountStatus::Active)
    }

    /// Name used in log lines.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}
