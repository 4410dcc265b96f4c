//! Leader election records.

use serde::{Deserialize, Serialize};

/// The single shared leadership record of an election domain.
///
/// Valid (its owner is alive) iff `now - last_heartbeat <= leader_timeout`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderRecord {
    pub instance_id: String,
    /// Unix millis of the owner's last heartbeat write
    pub last_heartbeat: i64,
    /// Unix millis of the election write that created this record
    pub elected_at: i64,
}

impl LeaderRecord {
    /// Fresh record for an instance claiming leadership at `now`.
    pub fn claim(instance_id: impl Into<String>, now: i64) -> Self {
        Self { instance_id: instance_id.into(), last_heartbeat: now, elected_at: now }
    }

    /// Check if the owner's heartbeat is within `timeout_ms` of `now`.
    pub const fn is_alive(&self, now: i64, timeout_ms: i64) -> bool {
        now.saturating_sub(self.last_heartbeat) <= timeout_ms
    }

    pub fn is_owned_by(&self, instance_id: &str) -> bool {
        self.instance_id == instance_id
    }
}

/// Role of this instance in the election.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LeadershipRole {
    #[default]
    Follower,
    Leader,
}

/// Snapshot of this instance's view of the election.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeadershipStatus {
    pub instance_id: String,
    pub role: LeadershipRole,
    /// Leader observed during the last heartbeat cycle, if any
    pub leader_id: Option<String>,
    /// When this instance last won an election (unix millis)
    pub elected_at: Option<i64>,
}
