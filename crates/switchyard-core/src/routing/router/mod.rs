//! Quota-aware multi-account request router.
//!
//! One call to [`RequestRouter::handle`] walks the candidate accounts in
//! selector order until one succeeds. Partial failures are logged and
//! absorbed; only the final outcome reaches the caller.

mod attempt;
mod token;

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{Account, RouterError, RoutingConfig};
use tokio_util::sync::CancellationToken;

use self::attempt::{AccountAttempt, AttemptTarget};
use super::quota::{quota_key, QuotaStateManager};
use super::selector::{AccountSelector, SelectionPrefs};
use super::transport::{ByteStream, Transport};
use crate::coordination::clock::Clock;
use crate::modules::accounts::AccountRepository;
use crate::modules::credentials::{default_credential_id, CredentialStore};
use crate::modules::oauth::TokenRefresher;
use crate::modules::settings::RoutingSettings;
use crate::telemetry;
use crate::utils::cancel::sleep_or_cancel;

/// Collaborators the router needs.
pub struct RouterDeps {
    pub accounts: Arc<dyn AccountRepository>,
    pub credentials: Arc<dyn CredentialStore>,
    pub settings: Arc<dyn RoutingSettings>,
    pub refresher: Arc<dyn TokenRefresher>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
}

pub struct RequestRouter {
    accounts: Arc<dyn AccountRepository>,
    credentials: Arc<dyn CredentialStore>,
    settings: Arc<dyn RoutingSettings>,
    refresher: Arc<dyn TokenRefresher>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    quota: Arc<QuotaStateManager>,
    selector: AccountSelector,
    config: RoutingConfig,
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

/// Bookkeeping across the candidate loop.
#[derive(Default)]
struct LoopState {
    last_error: Option<RouterError>,
    /// Most recent credential failure; outranks a later quota error.
    auth_error: Option<RouterError>,
    tried: Vec<String>,
    with_credential: usize,
    quota_failures: usize,
}

impl RequestRouter {
    pub fn new(deps: RouterDeps, config: RoutingConfig) -> Self {
        let quota = Arc::new(QuotaStateManager::from_config(deps.clock.clone(), &config));
        Self {
            accounts: deps.accounts,
            credentials: deps.credentials,
            settings: deps.settings,
            refresher: deps.refresher,
            transport: deps.transport,
            clock: deps.clock,
            selector: AccountSelector::new(quota.clone()),
            quota,
            config,
            refresh_locks: DashMap::new(),
        }
    }

    /// Cooldown state, for wait estimates on status surfaces.
    pub fn quota(&self) -> &Arc<QuotaStateManager> {
        &self.quota
    }

    /// Route one request for `model` through `provider`'s accounts.
    pub async fn handle(
        &self,
        provider: &str,
        model: &str,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, RouterError> {
        let result = self.route(provider, model, payload, cancel).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(RouterError::Cancelled) => "cancelled",
            Err(_) => "failure",
        };
        telemetry::record_request(provider, outcome);
        result
    }

    async fn route(
        &self,
        provider: &str,
        model: &str,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, RouterError> {
        if cancel.is_cancelled() {
            return Err(RouterError::Cancelled);
        }

        let endpoints = self.config.endpoints_for(provider);
        if endpoints.is_empty() {
            return Err(RouterError::NotFound {
                message: format!("No endpoint configured for provider {}", provider),
            });
        }

        let accounts = self.accounts.list_accounts(provider).await.map_err(|e| {
            RouterError::NoAvailableAccounts { reason: format!("Failed to load accounts: {}", e) }
        })?;

        let load_balancing = self.settings.load_balancing_enabled(provider).await;
        let assigned = self.settings.assigned_account(provider, model).await;
        let active = self.settings.active_account(provider).await;
        let candidates = self.selector.select(
            provider,
            model,
            &accounts,
            SelectionPrefs {
                assigned: assigned.as_deref(),
                active: active.as_deref(),
                load_balancing,
            },
        );

        if candidates.is_empty() {
            return self.route_default_credential(provider, model, &endpoints, payload, cancel).await;
        }

        let start = self.wait_for_first_candidate(&candidates, model, cancel).await?;

        let mut state = LoopState::default();
        for (index, account) in candidates.iter().enumerate().skip(start) {
            if cancel.is_cancelled() {
                return Err(RouterError::Cancelled);
            }
            if index > start {
                telemetry::record_failover(provider);
                tracing::info!(
                    "[Router] Failing over to {} for {} ({}/{})",
                    account.label(),
                    model,
                    index + 1,
                    candidates.len()
                );
            }
            state.tried.push(account.id.clone());

            let token = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RouterError::Cancelled),
                token = self.resolve_token(provider, &account.id) => token,
            };
            let token = match token {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("[Router] No usable token for {}: {}", account.label(), e);
                    let err = RouterError::from(e);
                    state.auth_error = Some(err.clone());
                    state.last_error = Some(err);
                    continue;
                },
            };
            state.with_credential += 1;

            let target = AttemptTarget {
                provider,
                model,
                credential_id: &account.id,
                label: account.label(),
                track_quota: true,
                load_balancing,
            };
            match self.attempt(&target, token, &endpoints, payload, cancel).await {
                AccountAttempt::Success(stream) => {
                    self.on_success(provider, model, account, index).await;
                    return Ok(stream);
                },
                AccountAttempt::Failover(err) => {
                    if err.is_rate_limit() {
                        state.quota_failures += 1;
                    }
                    tracing::warn!("[Router] {} failed for {}: {}", account.label(), model, err);
                    if matches!(err, RouterError::AuthenticationFailed { .. }) {
                        state.auth_error = Some(err.clone());
                    }
                    state.last_error = Some(err);
                },
                AccountAttempt::Fatal(err) => {
                    tracing::warn!("[Router] {} fatal for {}: {}", account.label(), model, err);
                    return Err(err);
                },
                AccountAttempt::Cancelled => return Err(RouterError::Cancelled),
            }
        }

        Err(self.exhausted_error(model, state))
    }

    /// Short cooldowns on the head candidate are waited out; long ones skip
    /// it, or fail fast when it is the only candidate. Returns the index to
    /// start from.
    async fn wait_for_first_candidate(
        &self,
        candidates: &[Account],
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<usize, RouterError> {
        let Some(first) = candidates.first() else {
            return Ok(0);
        };
        let remaining = self.quota.remaining_cooldown(&quota_key(&first.id, model));
        if remaining.is_zero() {
            return Ok(0);
        }

        if remaining <= Duration::from_secs(self.config.reasonable_wait_secs) {
            tracing::info!(
                "[Router] {} cooling down for {}ms, waiting",
                first.label(),
                remaining.as_millis()
            );
            if sleep_or_cancel(remaining, cancel).await.is_cancelled() {
                return Err(RouterError::Cancelled);
            }
            return Ok(0);
        }

        if candidates.len() > 1 {
            tracing::info!(
                "[Router] {} cooling down for {}s, skipping",
                first.label(),
                remaining.as_secs()
            );
            return Ok(1);
        }

        Err(RouterError::CooldownTooLong {
            account_id: first.id.clone(),
            wait_secs: remaining.as_millis().div_ceil(1000) as u64,
        })
    }

    async fn on_success(&self, provider: &str, model: &str, account: &Account, index: usize) {
        self.quota.clear_exceeded(&quota_key(&account.id, model));
        self.selector.record_used(provider, model, &account.id);
        if index > 0 {
            if let Err(e) = self.settings.set_assigned_account(provider, model, &account.id).await {
                tracing::warn!("[Router] Failed to persist sticky account for {}: {}", model, e);
            } else {
                tracing::info!("[Router] {} is now the sticky account for {}", account.label(), model);
            }
        }
        tracing::debug!("[Router] {} served {}", account.label(), model);
    }

    fn exhausted_error(&self, model: &str, state: LoopState) -> RouterError {
        if state.with_credential == 0 {
            return RouterError::NoAvailableAccounts {
                reason: state
                    .last_error
                    .map_or_else(|| "no usable credential".to_string(), |e| e.to_string()),
            };
        }

        // Only a pool where every tried account hit its quota is "wait it out".
        if state.tried.len() > 1 && state.quota_failures == state.tried.len() {
            let soonest = state
                .tried
                .iter()
                .map(|id| self.quota.remaining_cooldown(&quota_key(id, model)))
                .filter(|d| !d.is_zero())
                .min();
            return RouterError::AllRateLimited {
                retry_after_secs: soonest.map(|d| d.as_millis().div_ceil(1000) as u64),
            };
        }

        state.auth_error.or(state.last_error).unwrap_or_else(|| RouterError::NoAvailableAccounts {
            reason: "every candidate failed".to_string(),
        })
    }

    /// No accounts at all: use the provider's out-of-band credential with
    /// no cooldown or sticky bookkeeping.
    async fn route_default_credential(
        &self,
        provider: &str,
        model: &str,
        endpoints: &[String],
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, RouterError> {
        let credential_id = default_credential_id(provider);
        match self.credentials.get(&credential_id).await {
            Ok(Some(_)) => {},
            Ok(None) => {
                return Err(RouterError::NoAccountsConfigured { provider: provider.to_string() })
            },
            Err(e) => {
                return Err(RouterError::NoAvailableAccounts {
                    reason: format!("Failed to read default credential: {}", e),
                })
            },
        }

        tracing::debug!("[Router] No {} accounts, using default credential", provider);
        let token = self.resolve_token(provider, &credential_id).await.map_err(RouterError::from)?;

        let target = AttemptTarget {
            provider,
            model,
            credential_id: &credential_id,
            label: &credential_id,
            track_quota: false,
            load_balancing: false,
        };
        match self.attempt(&target, token, endpoints, payload, cancel).await {
            AccountAttempt::Success(stream) => Ok(stream),
            AccountAttempt::Failover(err) | AccountAttempt::Fatal(err) => Err(err),
            AccountAttempt::Cancelled => Err(RouterError::Cancelled),
        }
    }
}
