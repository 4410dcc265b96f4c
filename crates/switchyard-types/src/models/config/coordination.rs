//! Election and activity configuration.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Leader election timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[validate(schema(function = "validate_election_timing"))]
pub struct ElectionConfig {
    /// Interval between heartbeat cycles
    #[validate(range(min = 100_u64))]
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Heartbeat age after which a leader is considered dead
    #[serde(default = "default_leader_timeout")]
    pub leader_timeout_ms: u64,
    /// Wait between the election write and the read-back.
    /// Tunable: under slow store propagation a longer settle shortens
    /// split-brain windows.
    #[validate(range(max = 10_000_u64))]
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Upper bound of the random delay before the first heartbeat
    #[serde(default = "default_startup_jitter")]
    pub startup_jitter_ms: u64,
    /// Interval of the leader-only periodic task batch
    #[validate(range(min = 1000_u64))]
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_ms: u64,
    /// Shared-store key of the leader record
    #[validate(length(min = 1_u64))]
    #[serde(default = "default_leader_key")]
    pub leader_key: String,
}

fn validate_election_timing(cfg: &ElectionConfig) -> Result<(), ValidationError> {
    if cfg.leader_timeout_ms <= cfg.heartbeat_interval_ms {
        return Err(ValidationError::new("leader_timeout_must_exceed_heartbeat_interval"));
    }
    Ok(())
}

const fn default_heartbeat_interval() -> u64 {
    5_000
}

const fn default_leader_timeout() -> u64 {
    15_000
}

const fn default_settle_delay() -> u64 {
    100
}

const fn default_startup_jitter() -> u64 {
    1_000
}

const fn default_periodic_interval() -> u64 {
    60_000
}

fn default_leader_key() -> String {
    "switchyard.leader".to_string()
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval(),
            leader_timeout_ms: default_leader_timeout(),
            settle_delay_ms: default_settle_delay(),
            startup_jitter_ms: default_startup_jitter(),
            periodic_interval_ms: default_periodic_interval(),
            leader_key: default_leader_key(),
        }
    }
}

/// User activity gating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ActivityConfig {
    /// Inactivity after which leader-only work is skipped
    #[validate(range(min = 1000_u64))]
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_ms: u64,
    /// How long a read of the shared record is reused
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_ms: u64,
    /// Gap after which the recent-activity counter restarts at 1
    #[serde(default = "default_counting_window")]
    pub counting_window_ms: u64,
    /// Cap of the recent-activity counter
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_max_recent_count")]
    pub max_recent_count: u32,
    /// Text edits touching this many characters or more are treated as bulk/automatic
    #[validate(range(min = 1_usize))]
    #[serde(default = "default_bulk_edit_threshold")]
    pub bulk_edit_threshold: usize,
    /// Shared-store key of the activity record
    #[validate(length(min = 1_u64))]
    #[serde(default = "default_activity_key")]
    pub activity_key: String,
}

const fn default_inactivity_timeout() -> u64 {
    30 * 60 * 1000
}

const fn default_cache_ttl() -> u64 {
    3_000
}

const fn default_counting_window() -> u64 {
    60_000
}

const fn default_max_recent_count() -> u32 {
    100
}

const fn default_bulk_edit_threshold() -> usize {
    100
}

fn default_activity_key() -> String {
    "switchyard.activity".to_string()
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: default_inactivity_timeout(),
            cache_ttl_ms: default_cache_ttl(),
            counting_window_ms: default_counting_window(),
            max_recent_count: default_max_recent_count(),
            bulk_edit_threshold: default_bulk_edit_threshold(),
            activity_key: default_activity_key(),
        }
    }
}
