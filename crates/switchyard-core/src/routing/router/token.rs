use std::sync::Arc;
use switchyard_types::{AccountError, Credential};

use super::RequestRouter;
use crate::telemetry;

impl RequestRouter {
    /// Access token for `credential_id`, refreshed first when it expires
    /// within the safety margin.
    pub(super) async fn resolve_token(
        &self,
        provider: &str,
        credential_id: &str,
    ) -> Result<String, AccountError> {
        let credential = self.load_credential(credential_id).await?;

        let margin = self.config.token_refresh_margin_secs;
        if !credential.expires_within(self.clock.now_secs(), margin) {
            return Ok(credential.access_token);
        }
        self.refresh_token(provider, credential_id, None).await
    }

    /// Refresh under the per-credential lock so concurrent requests do not
    /// all hit the token endpoint. `rejected` is a token the provider just
    /// refused; if another request already replaced it, that token is used.
    pub(super) async fn refresh_token(
        &self,
        provider: &str,
        credential_id: &str,
        rejected: Option<&str>,
    ) -> Result<String, AccountError> {
        let lock = self
            .refresh_locks
            .entry(credential_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut credential = self.load_credential(credential_id).await?;

        let now = self.clock.now_secs();
        let still_fresh = !credential.expires_within(now, self.config.token_refresh_margin_secs);
        match rejected {
            Some(rejected) if credential.access_token != rejected && still_fresh => {
                return Ok(credential.access_token);
            },
            None if still_fresh => return Ok(credential.access_token),
            _ => {},
        }

        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| AccountError::TokenExpired { id: credential_id.to_string() })?;

        tracing::info!("[Router] Refreshing token for {}", credential_id);
        let refreshed = match self.refresher.refresh(provider, &refresh_token).await {
            Ok(r) => {
                telemetry::record_token_refresh(provider, "success");
                r
            },
            Err(e) => {
                telemetry::record_token_refresh(provider, "failure");
                return Err(AccountError::TokenRefreshFailed {
                    id: credential_id.to_string(),
                    message: e,
                });
            },
        };

        credential.apply_refresh(&refreshed, self.clock.now_secs());
        if let Err(e) = self.credentials.update(credential_id, credential.clone()).await {
            tracing::warn!("[Router] Failed to persist refreshed token for {}: {}", credential_id, e);
        }
        Ok(credential.access_token)
    }

    async fn load_credential(&self, credential_id: &str) -> Result<Credential, AccountError> {
        self.credentials
            .get(credential_id)
            .await?
            .ok_or_else(|| AccountError::MissingCredential { id: credential_id.to_string() })
    }
}
