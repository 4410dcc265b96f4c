//! Account routing configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Cooldown, retry, and failover tuning for the request router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RoutingConfig {
    /// Base of the per-key exponential cooldown
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_cooldown_base")]
    pub cooldown_base_ms: u64,
    /// Cap of the per-key exponential cooldown
    #[serde(default = "default_cooldown_cap")]
    pub cooldown_cap_ms: u64,
    /// In-place retries for a single account when load balancing is off
    #[validate(range(min = 1_u32, max = 20_u32))]
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Base of the in-place retry backoff
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,
    /// Cap of any single in-place retry sleep
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// Added to a server-provided retry hint
    #[serde(default = "default_retry_hint_buffer")]
    pub retry_hint_buffer_ms: u64,
    /// Tokens expiring within this margin are refreshed before use
    #[serde(default = "default_refresh_margin")]
    pub token_refresh_margin_secs: i64,
    /// Reset windows longer than this are treated as long-term exhaustion
    #[serde(default = "default_long_quota_threshold")]
    pub long_quota_threshold_secs: u64,
    /// Longest cooldown the router waits out instead of failing over
    #[serde(default = "default_reasonable_wait")]
    pub reasonable_wait_secs: u64,
    /// Ordered endpoints per provider; a 5xx moves to the next one
    #[serde(default)]
    pub endpoints: HashMap<String, Vec<String>>,
    /// OAuth token endpoint per provider
    #[serde(default)]
    pub token_urls: HashMap<String, String>,
    /// OAuth client per provider; env vars fill in what is missing
    #[serde(default)]
    pub oauth_clients: HashMap<String, OAuthClient>,
}

/// Client credentials sent with a refresh-token grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

const fn default_cooldown_base() -> u64 {
    1_000
}

const fn default_cooldown_cap() -> u64 {
    30 * 60 * 1000
}

const fn default_retry_max_attempts() -> u32 {
    5
}

const fn default_retry_base() -> u64 {
    1_000
}

const fn default_retry_max_delay() -> u64 {
    30_000
}

const fn default_retry_hint_buffer() -> u64 {
    500
}

const fn default_refresh_margin() -> i64 {
    300
}

const fn default_long_quota_threshold() -> u64 {
    600
}

const fn default_reasonable_wait() -> u64 {
    120
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cooldown_base_ms: default_cooldown_base(),
            cooldown_cap_ms: default_cooldown_cap(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_ms: default_retry_base(),
            retry_max_delay_ms: default_retry_max_delay(),
            retry_hint_buffer_ms: default_retry_hint_buffer(),
            token_refresh_margin_secs: default_refresh_margin(),
            long_quota_threshold_secs: default_long_quota_threshold(),
            reasonable_wait_secs: default_reasonable_wait(),
            endpoints: HashMap::new(),
            token_urls: HashMap::new(),
            oauth_clients: HashMap::new(),
        }
    }
}

impl RoutingConfig {
    /// Endpoints for `provider`, in fallback order.
    pub fn endpoints_for(&self, provider: &str) -> Vec<String> {
        self.endpoints.get(provider).cloned().unwrap_or_default()
    }
}
