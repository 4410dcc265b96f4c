//! OAuth refresh-token grant.

use async_trait::async_trait;
use std::collections::HashMap;
use switchyard_types::{OAuthClient, RefreshedToken, RoutingConfig};

use crate::utils::http::create_client;

const REFRESH_TIMEOUT_SECS: u64 = 30;

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, provider: &str, refresh_token: &str) -> Result<RefreshedToken, String>;
}

/// Refresher posting `grant_type=refresh_token` to each provider's token endpoint.
pub struct OAuthRefresher {
    client: reqwest::Client,
    token_urls: HashMap<String, String>,
    clients: HashMap<String, OAuthClient>,
}

impl OAuthRefresher {
    pub fn new(
        token_urls: HashMap<String, String>,
        clients: HashMap<String, OAuthClient>,
    ) -> Result<Self, String> {
        Ok(Self { client: create_client(REFRESH_TIMEOUT_SECS)?, token_urls, clients })
    }

    pub fn from_config(config: &RoutingConfig) -> Result<Self, String> {
        Self::new(config.token_urls.clone(), config.oauth_clients.clone())
    }

    /// Configured client first, then `SWITCHYARD_<PROVIDER>_OAUTH_*` and
    /// `SWITCHYARD_OAUTH_*` env vars.
    fn client_for(&self, provider: &str) -> Result<OAuthClient, String> {
        if let Some(configured) = self.clients.get(provider) {
            return Ok(configured.clone());
        }
        let client_id = env_first(&env_keys(provider, "CLIENT_ID")).ok_or_else(|| {
            format!(
                "Missing OAuth client_id for {}. Configure oauth_clients or set SWITCHYARD_{}_OAUTH_CLIENT_ID",
                provider,
                provider.to_uppercase()
            )
        })?;
        Ok(OAuthClient { client_id, client_secret: env_first(&env_keys(provider, "CLIENT_SECRET")) })
    }
}

fn env_first(keys: &[String]) -> Option<String> {
    for k in keys {
        if let Ok(v) = std::env::var(k) {
            let t = v.trim();
            if !t.is_empty() {
                return Some(t.to_string());
            }
        }
    }
    None
}

fn env_keys(provider: &str, suffix: &str) -> Vec<String> {
    vec![
        format!("SWITCHYARD_{}_OAUTH_{}", provider.to_uppercase(), suffix),
        format!("SWITCHYARD_OAUTH_{}", suffix),
    ]
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, provider: &str, refresh_token: &str) -> Result<RefreshedToken, String> {
        let token_url = self
            .token_urls
            .get(provider)
            .ok_or_else(|| format!("No OAuth token endpoint configured for {}", provider))?;

        let oauth_client = self.client_for(provider)?;
        let mut params: Vec<(&str, String)> = vec![
            ("client_id", oauth_client.client_id),
            ("refresh_token", refresh_token.to_string()),
            ("grant_type", "refresh_token".to_string()),
        ];
        if let Some(secret) = oauth_client.client_secret {
            params.push(("client_secret", secret));
        }

        tracing::debug!("[OAuth] Refreshing token for provider {}", provider);

        let response = self.client.post(token_url).form(&params).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                format!("Refresh request failed: {}. Unable to reach the authorization server", e)
            } else {
                format!("Refresh request failed: {}", e)
            }
        })?;

        if response.status().is_success() {
            let token_data = response
                .json::<RefreshedToken>()
                .await
                .map_err(|e| format!("Refresh data parsing failed: {}", e))?;
            tracing::info!(
                "[OAuth] Token refreshed for {} (expires in {}s)",
                provider,
                token_data.expires_in
            );
            Ok(token_data)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(format!("Refresh failed: {}", error_text))
        }
    }
}
