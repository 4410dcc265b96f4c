//! Request routing errors.
//!
//! These are the only errors a caller of the router ever sees. Partial
//! failures (one account failing before another succeeds) never surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AccountError;

/// What the end user has to do to recover from a routing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectiveAction {
    /// Wait for the cooldown to pass, then retry
    Wait,
    /// Sign in again (credential revoked or expired)
    Reauthenticate,
    /// Add another account for this provider
    AddAccount,
    /// Fix the account's permissions or project configuration
    FixPermissions,
    /// Fix the request itself
    FixRequest,
    /// Nothing actionable (transient or unknown)
    None,
}

/// Errors surfaced by the request router.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum RouterError {
    /// Provider rejected the account outright (permission denied / consumer invalid)
    #[error("Permission denied for account {account_id}: {message}")]
    PermissionDenied { account_id: String, message: String },

    /// Single account is rate-limited or out of quota
    #[error("Quota exhausted for account {account_id}{}", retry_after_secs.map(|s| format!(", retry in {}", format_wait(s))).unwrap_or_default())]
    QuotaExhausted { account_id: String, retry_after_secs: Option<u64>, message: String },

    /// Every candidate account is rate-limited
    #[error("All accounts are rate limited{}", retry_after_secs.map(|s| format!(", retry in {}", format_wait(s))).unwrap_or_default())]
    AllRateLimited { retry_after_secs: Option<u64> },

    /// The only usable account is cooling down longer than is reasonable to wait
    #[error("Account {account_id} is rate limited for another {}. Add another account to keep working without waiting", format_wait(*wait_secs))]
    CooldownTooLong { account_id: String, wait_secs: u64 },

    /// Credential rejected by the provider (after one refresh)
    #[error("Authentication failed for account {account_id}: {message}. Sign in again")]
    AuthenticationFailed { account_id: String, message: String },

    /// Provider rejected the request itself (400)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Model or endpoint not found (404)
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Provider unavailable on every endpoint (5xx)
    #[error("Upstream unavailable ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Unclassified provider failure; full body kept for diagnosis
    #[error("Unexpected upstream response ({status}): {body}")]
    Unknown { status: u16, body: String },

    /// No accounts and no default credential for the provider
    #[error("No accounts configured for {provider}. Add an account to continue")]
    NoAccountsConfigured { provider: String },

    /// Accounts exist but none produced a usable credential
    #[error("No available accounts: {reason}")]
    NoAvailableAccounts { reason: String },

    /// Caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,
}

impl RouterError {
    /// Corrective action implied by this error.
    pub const fn corrective_action(&self) -> CorrectiveAction {
        match self {
            Self::QuotaExhausted { .. } | Self::AllRateLimited { .. } => CorrectiveAction::Wait,
            Self::CooldownTooLong { .. } | Self::NoAccountsConfigured { .. } => {
                CorrectiveAction::AddAccount
            },
            Self::AuthenticationFailed { .. } | Self::NoAvailableAccounts { .. } => {
                CorrectiveAction::Reauthenticate
            },
            Self::PermissionDenied { .. } => CorrectiveAction::FixPermissions,
            Self::InvalidRequest { .. } | Self::NotFound { .. } => CorrectiveAction::FixRequest,
            Self::Upstream { .. } | Self::Unknown { .. } | Self::Cancelled => CorrectiveAction::None,
        }
    }

    /// Check if this error is caused by rate limiting or exhausted quota.
    pub const fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            Self::QuotaExhausted { .. } | Self::AllRateLimited { .. } | Self::CooldownTooLong { .. }
        )
    }

    /// Get HTTP status code for this error.
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::PermissionDenied { .. } => 403,
            Self::QuotaExhausted { .. }
            | Self::AllRateLimited { .. }
            | Self::CooldownTooLong { .. } => 429,
            Self::AuthenticationFailed { .. } => 401,
            Self::InvalidRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Upstream { .. } | Self::Unknown { .. } => 502,
            Self::NoAccountsConfigured { .. } | Self::NoAvailableAccounts { .. } => 503,
            Self::Cancelled => 499,
        }
    }
}

impl From<AccountError> for RouterError {
    fn from(err: AccountError) -> Self {
        if err.requires_reauth() {
            Self::AuthenticationFailed { account_id: err.account_id().to_string(), message: err.to_string() }
        } else {
            Self::NoAvailableAccounts { reason: err.to_string() }
        }
    }
}

/// Human-readable wait estimate ("45s", "3m 20s", "1h 5m").
pub fn format_wait(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
