use serde_json::Value;
use switchyard_types::RouterError;
use tokio_util::sync::CancellationToken;

use super::RequestRouter;
use crate::routing::classify::{analyze, classify_status, decide, to_router_error, AttemptDecision, ErrorCategory};
use crate::routing::quota::quota_key;
use crate::routing::retry::{RetryPolicy, RetryWait};
use crate::routing::transport::{ByteStream, TransportOutcome};
use crate::telemetry;

const MAX_LOGGED_BODY: usize = 512;

/// The credential one attempt runs under.
pub(super) struct AttemptTarget<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub credential_id: &'a str,
    pub label: &'a str,
    /// Cooldowns are only tracked for real accounts.
    pub track_quota: bool,
    pub load_balancing: bool,
}

pub(super) enum AccountAttempt {
    Success(ByteStream),
    /// Give up on this account; the next candidate may still succeed.
    Failover(RouterError),
    Fatal(RouterError),
    Cancelled,
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

impl RequestRouter {
    /// Run one account to a verdict: endpoint fallback on every send, one
    /// token refresh on an auth failure, bounded in-place retries when the
    /// decision table says so.
    pub(super) async fn attempt(
        &self,
        target: &AttemptTarget<'_>,
        mut token: String,
        endpoints: &[String],
        payload: &Value,
        cancel: &CancellationToken,
    ) -> AccountAttempt {
        let mut refreshed = false;
        let mut retry = RetryPolicy::from_config(&self.config);

        loop {
            let (status, body) = match self
                .send_with_fallback(endpoints, target.model, payload, &token, cancel)
                .await
            {
                TransportOutcome::Success(stream) => return AccountAttempt::Success(stream),
                TransportOutcome::Cancelled => return AccountAttempt::Cancelled,
                TransportOutcome::Failure { status, body } => (status, body),
            };

            let analysis = analyze(status, &body, self.config.long_quota_threshold_secs);
            tracing::debug!(
                "[Router] {} got {:?} ({:?}): {}",
                target.label,
                status,
                analysis.category,
                truncate(&body)
            );

            if analysis.category == ErrorCategory::AuthError && !refreshed {
                refreshed = true;
                match self.refresh_token(target.provider, target.credential_id, Some(&token)).await {
                    Ok(fresh) => {
                        token = fresh;
                        continue;
                    },
                    Err(e) => {
                        tracing::warn!("[Router] Refresh after 401 failed for {}: {}", target.label, e);
                    },
                }
            }

            if analysis.category == ErrorCategory::QuotaError && target.track_quota {
                self.quota.mark_exceeded_with_reason(
                    &quota_key(target.credential_id, target.model),
                    analysis.retry_hint_ms,
                    Some(truncate(&body)),
                );
                telemetry::record_cooldown(target.provider);
            }

            let error = to_router_error(&analysis, target.credential_id, &body);
            match decide(&analysis, target.load_balancing) {
                AttemptDecision::Fatal => return AccountAttempt::Fatal(error),
                AttemptDecision::Failover => return AccountAttempt::Failover(error),
                AttemptDecision::Retry => match retry.wait(Some(&body), cancel).await {
                    RetryWait::Retry(delay) => {
                        tracing::info!(
                            "[Router] Retrying {} in place after {}ms",
                            target.label,
                            delay.as_millis()
                        );
                    },
                    RetryWait::Exhausted => return AccountAttempt::Failover(error),
                    RetryWait::Cancelled => return AccountAttempt::Cancelled,
                },
            }
        }
    }

    /// Try each endpoint in order with the same token. Only a transient
    /// failure moves on to the next endpoint.
    async fn send_with_fallback(
        &self,
        endpoints: &[String],
        model: &str,
        payload: &Value,
        token: &str,
        cancel: &CancellationToken,
    ) -> TransportOutcome {
        for (i, endpoint) in endpoints.iter().enumerate() {
            let url = endpoint.replace("{model}", model);
            let outcome = self.transport.send(&url, payload, token, cancel).await;
            let has_next = i + 1 < endpoints.len();
            match outcome {
                TransportOutcome::Failure { status, body }
                    if has_next && classify_status(status) == ErrorCategory::Transient =>
                {
                    tracing::warn!(
                        "[Router] Endpoint {} unavailable ({:?}): {}, trying next",
                        url,
                        status,
                        truncate(&body)
                    );
                },
                outcome => return outcome,
            }
        }
        TransportOutcome::Failure { status: None, body: "no endpoint configured".to_string() }
    }
}
