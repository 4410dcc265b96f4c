//! Metrics for routing outcomes and leadership.
//!
//! No recorder is installed here; every call is a no-op until the host
//! installs one (e.g. a Prometheus exporter).

#![allow(clippy::arithmetic_side_effects, reason = "bounded counters")]

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register metric descriptions. Call once after installing a recorder.
pub fn init_metrics() {
    describe_counter!(
        "switchyard_requests_total",
        "Routed requests by provider and final outcome"
    );
    describe_counter!(
        "switchyard_failovers_total",
        "Candidate switches after a recoverable account failure"
    );
    describe_counter!(
        "switchyard_cooldowns_total",
        "Quota cooldowns marked per provider"
    );
    describe_counter!(
        "switchyard_token_refresh_total",
        "OAuth token refresh attempts by result"
    );
    describe_gauge!("switchyard_is_leader", "1 while this instance holds leadership");
    describe_counter!(
        "switchyard_periodic_batches_total",
        "Leader periodic batches by result"
    );
}

/// Labels: outcome = "success" | "failure" | "cancelled"
pub(crate) fn record_request(provider: &str, outcome: &str) {
    let labels = [("provider", provider.to_string()), ("outcome", outcome.to_string())];
    counter!("switchyard_requests_total", &labels).increment(1);
}

pub(crate) fn record_failover(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!("switchyard_failovers_total", &labels).increment(1);
}

pub(crate) fn record_cooldown(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!("switchyard_cooldowns_total", &labels).increment(1);
}

/// Labels: result = "success" | "failure"
pub(crate) fn record_token_refresh(provider: &str, result: &str) {
    let labels = [("provider", provider.to_string()), ("result", result.to_string())];
    counter!("switchyard_token_refresh_total", &labels).increment(1);
}

pub(crate) fn set_leader(is_leader: bool) {
    gauge!("switchyard_is_leader").set(if is_leader { 1.0 } else { 0.0 });
}

/// Labels: result = "ran" | "skipped_inactive"
pub(crate) fn record_periodic_batch(result: &str) {
    let labels = [("result", result.to_string())];
    counter!("switchyard_periodic_batches_total", &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_are_noops_without_exporter() {
        init_metrics();
        record_request("claude", "success");
        record_failover("claude");
        record_cooldown("claude");
        record_token_refresh("claude", "failure");
        set_leader(true);
        record_periodic_batch("ran");
    }
}
