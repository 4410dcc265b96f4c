//! Credential model.

use serde::{Deserialize, Serialize};

/// OAuth credential for one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// OAuth access token
    pub access_token: String,
    /// OAuth refresh token for renewing access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry (unix seconds)
    pub expires_at: i64,
}

impl Credential {
    /// Create a credential expiring `expires_in` seconds after `now`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        now: i64,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: now.saturating_add(expires_in),
        }
    }

    /// Check if the token expires within `margin_secs` of `now`.
    pub const fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        now.saturating_add(margin_secs) >= self.expires_at
    }

    /// Apply a refresh response. Keeps the old refresh token when the
    /// provider does not rotate it.
    pub fn apply_refresh(&mut self, refreshed: &RefreshedToken, now: i64) {
        self.access_token = refreshed.access_token.clone();
        self.expires_at = now.saturating_add(refreshed.expires_in);
        if let Some(ref rotated) = refreshed.refresh_token {
            self.refresh_token = Some(rotated.clone());
        }
    }
}

/// Response of an OAuth refresh-token grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
