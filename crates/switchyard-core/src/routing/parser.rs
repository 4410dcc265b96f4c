//! Provider error body parsing: retry hints and permission signals.
//!
//! All hints are returned in milliseconds.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static DURATION_COMPONENT_REGEX: OnceLock<Regex> = OnceLock::new();
static RETRY_M_S_REGEX: OnceLock<Regex> = OnceLock::new();
static RETRY_S_REGEX: OnceLock<Regex> = OnceLock::new();
static QUOTA_RESET_REGEX: OnceLock<Regex> = OnceLock::new();
static RETRY_AFTER_REGEX: OnceLock<Regex> = OnceLock::new();
static WAIT_PAREN_REGEX: OnceLock<Regex> = OnceLock::new();

fn duration_component_regex() -> &'static Regex {
    // "ms" must be tried before "m".
    DURATION_COMPONENT_REGEX.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(ms|h|m|s)").expect("Duration component regex is valid")
    })
}

fn retry_m_s_regex() -> &'static Regex {
    RETRY_M_S_REGEX.get_or_init(|| {
        Regex::new(r"(?i)try again in (\d+)m\s*(\d+)s").expect("Retry m s regex is valid")
    })
}

fn retry_s_regex() -> &'static Regex {
    RETRY_S_REGEX.get_or_init(|| {
        Regex::new(r"(?i)(?:try again in|backoff for)\s*(\d+)\s*s").expect("Retry s regex is valid")
    })
}

fn quota_reset_regex() -> &'static Regex {
    QUOTA_RESET_REGEX.get_or_init(|| {
        Regex::new(r"(?i)quota will reset in (\d+) second").expect("Quota reset regex is valid")
    })
}

fn retry_after_regex() -> &'static Regex {
    RETRY_AFTER_REGEX.get_or_init(|| {
        Regex::new(r"(?i)retry after (\d+) second").expect("Retry after regex is valid")
    })
}

fn wait_paren_regex() -> &'static Regex {
    WAIT_PAREN_REGEX
        .get_or_init(|| Regex::new(r"(?i)\(wait (\d+)\s*s\)").expect("Wait paren regex is valid"))
}

/// Parse a composite duration such as `"1h2m3s"`, `"42s"`, `"1.5s"` or
/// `"250ms"` into milliseconds.
pub fn parse_duration_ms(s: &str) -> Option<u64> {
    let mut total_ms = 0.0_f64;
    let mut matched = false;

    for caps in duration_component_regex().captures_iter(s) {
        let Ok(value) = caps[1].parse::<f64>() else {
            continue;
        };
        let factor = match caps[2].to_ascii_lowercase().as_str() {
            "h" => 3_600_000.0,
            "m" => 60_000.0,
            "s" => 1_000.0,
            _ => 1.0,
        };
        total_ms += value * factor;
        matched = true;
    }

    if !matched {
        tracing::debug!("[Parser] No duration components in '{}'", s);
        return None;
    }
    Some(total_ms.ceil() as u64)
}

fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}

fn hint_from_envelope(json: &Value) -> Option<u64> {
    let error = json.get("error")?;

    if let Some(details) = error.get("details").and_then(Value::as_array) {
        for detail in details {
            let reset = detail
                .get("metadata")
                .and_then(|m| m.get("quotaResetDelay"))
                .and_then(Value::as_str)
                .or_else(|| detail.get("retryDelay").and_then(Value::as_str));
            if let Some(ms) = reset.and_then(parse_duration_ms) {
                return Some(ms);
            }
        }
    }

    match error.get("retry_after") {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(secs_to_ms)
            .or_else(|| n.as_f64().map(|f| (f.max(0.0) * 1000.0).ceil() as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok().map(secs_to_ms),
        _ => None,
    }
}

/// Server-provided retry hint in milliseconds, if the body carries one.
pub fn parse_retry_hint_ms(body: &str) -> Option<u64> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
            if let Some(ms) = hint_from_envelope(&json) {
                return Some(ms);
            }
        }
    }

    if let Some(caps) = retry_m_s_regex().captures(body) {
        if let (Ok(m), Ok(s)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) {
            return Some(secs_to_ms(m.saturating_mul(60).saturating_add(s)));
        }
    }

    for re in [retry_s_regex(), quota_reset_regex(), retry_after_regex(), wait_paren_regex()] {
        if let Some(secs) = re.captures(body).and_then(|caps| caps[1].parse::<u64>().ok()) {
            return Some(secs_to_ms(secs));
        }
    }

    None
}

/// Whether the body says the account itself is not allowed to use the
/// provider, as opposed to being out of quota. Some providers send 403 for
/// both.
pub fn is_permission_denied(body: &str) -> bool {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
            let error = json.get("error");
            let status = error.and_then(|e| e.get("status")).and_then(Value::as_str);
            if status == Some("PERMISSION_DENIED") {
                return true;
            }
            let consumer_invalid = error
                .and_then(|e| e.get("details"))
                .and_then(Value::as_array)
                .is_some_and(|details| {
                    details.iter().any(|d| {
                        d.get("reason").and_then(Value::as_str) == Some("CONSUMER_INVALID")
                    })
                });
            if consumer_invalid {
                return true;
            }
        }
    }

    let lower = body.to_lowercase();
    lower.contains("permission denied")
        || lower.contains("permission_denied")
        || lower.contains("consumer invalid")
        || lower.contains("consumer_invalid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_components() {
        assert_eq!(parse_duration_ms("1h2m3s"), Some(3_723_000));
        assert_eq!(parse_duration_ms("42s"), Some(42_000));
        assert_eq!(parse_duration_ms("250ms"), Some(250));
        assert_eq!(parse_duration_ms("1.5s"), Some(1_500));
        assert_eq!(parse_duration_ms("2m 30s"), Some(150_000));
        assert_eq!(parse_duration_ms("soon"), None);
    }

    #[test]
    fn test_quota_reset_delay_in_envelope() {
        let body = r#"{
            "error": {
                "code": 429,
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.ErrorInfo",
                     "metadata": {"quotaResetDelay": "1h30m0s"}}
                ]
            }
        }"#;
        assert_eq!(parse_retry_hint_ms(body), Some(5_400_000));
    }

    #[test]
    fn test_retry_delay_and_retry_after_fields() {
        let retry_info = r#"{"error":{"details":[{"@type":"RetryInfo","retryDelay":"17s"}]}}"#;
        assert_eq!(parse_retry_hint_ms(retry_info), Some(17_000));

        let retry_after = r#"{"error":{"message":"slow down","retry_after":30}}"#;
        assert_eq!(parse_retry_hint_ms(retry_after), Some(30_000));
    }

    #[test]
    fn test_free_text_hints() {
        assert_eq!(parse_retry_hint_ms("Rate limited. Please try again in 2m 5s."), Some(125_000));
        assert_eq!(parse_retry_hint_ms("Your quota will reset in 90 seconds"), Some(90_000));
        assert_eq!(parse_retry_hint_ms("retry after 7 seconds"), Some(7_000));
        assert_eq!(parse_retry_hint_ms("Too many requests (wait 12s)"), Some(12_000));
        assert_eq!(parse_retry_hint_ms("Too many requests"), None);
    }

    #[test]
    fn test_huge_free_text_hint_saturates() {
        assert_eq!(
            parse_retry_hint_ms("Please try again in 999999999999999999m 5s."),
            Some(u64::MAX)
        );
    }

    #[test]
    fn test_permission_denied_detection() {
        assert!(is_permission_denied(
            r#"{"error":{"code":403,"status":"PERMISSION_DENIED","message":"no access"}}"#
        ));
        assert!(is_permission_denied(
            r#"{"error":{"code":403,"details":[{"reason":"CONSUMER_INVALID"}]}}"#
        ));
        assert!(is_permission_denied("403 Forbidden: Permission denied on project"));
        assert!(!is_permission_denied(
            r#"{"error":{"code":403,"status":"RESOURCE_EXHAUSTED","message":"quota"}}"#
        ));
    }
}
