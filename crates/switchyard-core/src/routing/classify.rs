//! Failure classification and the per-attempt decision table.

use switchyard_types::RouterError;

use super::parser::{is_permission_denied, parse_retry_hint_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 400: the request itself is bad
    UserError,
    /// 401: credential rejected
    AuthError,
    /// 402/403/429: rate limit or balance exhausted
    QuotaError,
    /// Body says the account may not use the provider at all
    PermissionError,
    NotFound,
    /// 5xx or no response at all
    Transient,
    Unknown,
}

/// Category from the status code alone. `None` means the request never got
/// a response (connect/timeout) and counts as transient.
pub fn classify_status(status: Option<u16>) -> ErrorCategory {
    match status {
        None => ErrorCategory::Transient,
        Some(400) => ErrorCategory::UserError,
        Some(401) => ErrorCategory::AuthError,
        Some(402 | 403 | 429) => ErrorCategory::QuotaError,
        Some(404) => ErrorCategory::NotFound,
        Some(500..=599) => ErrorCategory::Transient,
        Some(_) => ErrorCategory::Unknown,
    }
}

/// Status category, overridden by an explicit permission-denied body.
pub fn classify(status: Option<u16>, body: &str) -> ErrorCategory {
    if is_permission_denied(body) {
        return ErrorCategory::PermissionError;
    }
    classify_status(status)
}

pub const fn should_failover(category: ErrorCategory) -> bool {
    matches!(
        category,
        ErrorCategory::QuotaError | ErrorCategory::Transient | ErrorCategory::AuthError
    )
}

/// What the router does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Back off and try the same account again.
    Retry,
    /// Move on to the next candidate account.
    Failover,
    /// Stop and surface this failure.
    Fatal,
}

/// Everything the router needs to know about one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureAnalysis {
    pub category: ErrorCategory,
    pub status: Option<u16>,
    pub retry_hint_ms: Option<u64>,
    /// Quota reset window longer than the configured threshold
    pub long_quota: bool,
}

pub fn analyze(status: Option<u16>, body: &str, long_quota_threshold_secs: u64) -> FailureAnalysis {
    let category = classify(status, body);
    let retry_hint_ms = match category {
        ErrorCategory::QuotaError | ErrorCategory::Transient => parse_retry_hint_ms(body),
        _ => None,
    };
    let long_quota = category == ErrorCategory::QuotaError
        && retry_hint_ms.is_some_and(|ms| ms > long_quota_threshold_secs.saturating_mul(1000));
    FailureAnalysis { category, status, retry_hint_ms, long_quota }
}

/// Decision table for a failure that endpoint fallback and the one-shot
/// token refresh could not fix.
pub fn decide(analysis: &FailureAnalysis, load_balancing: bool) -> AttemptDecision {
    match analysis.category {
        ErrorCategory::PermissionError => AttemptDecision::Fatal,
        ErrorCategory::QuotaError if analysis.long_quota => {
            if load_balancing {
                AttemptDecision::Failover
            } else {
                AttemptDecision::Fatal
            }
        },
        ErrorCategory::QuotaError | ErrorCategory::Transient => {
            if load_balancing {
                AttemptDecision::Failover
            } else {
                AttemptDecision::Retry
            }
        },
        ErrorCategory::AuthError => {
            if load_balancing {
                AttemptDecision::Failover
            } else {
                AttemptDecision::Fatal
            }
        },
        ErrorCategory::UserError | ErrorCategory::NotFound | ErrorCategory::Unknown => {
            AttemptDecision::Fatal
        },
    }
}

/// User-facing error for a failed attempt on `account_id`.
pub fn to_router_error(analysis: &FailureAnalysis, account_id: &str, body: &str) -> RouterError {
    let status = analysis.status.unwrap_or(0);
    match analysis.category {
        ErrorCategory::PermissionError => RouterError::PermissionDenied {
            account_id: account_id.to_string(),
            message: body.to_string(),
        },
        ErrorCategory::QuotaError => RouterError::QuotaExhausted {
            account_id: account_id.to_string(),
            retry_after_secs: analysis.retry_hint_ms.map(|ms| ms.div_ceil(1000)),
            message: body.to_string(),
        },
        ErrorCategory::AuthError => RouterError::AuthenticationFailed {
            account_id: account_id.to_string(),
            message: body.to_string(),
        },
        ErrorCategory::UserError => RouterError::InvalidRequest { message: body.to_string() },
        ErrorCategory::NotFound => RouterError::NotFound { message: body.to_string() },
        ErrorCategory::Transient => RouterError::Upstream { status, message: body.to_string() },
        ErrorCategory::Unknown => RouterError::Unknown { status, body: body.to_string() },
    }
}
