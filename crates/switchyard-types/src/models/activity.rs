//! End-user activity records.

use serde::{Deserialize, Serialize};

/// Kind of genuine user interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    WindowFocus,
    Selection,
    TextEdit,
    Terminal,
    Command,
}

impl ActivityKind {
    /// Minimum interval between two recorded events of this kind.
    pub const fn throttle_window_ms(self) -> i64 {
        match self {
            Self::WindowFocus => 5_000,
            Self::Selection | Self::TextEdit | Self::Command => 2_000,
            Self::Terminal => 3_000,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WindowFocus => "window_focus",
            Self::Selection => "selection",
            Self::TextEdit => "text_edit",
            Self::Terminal => "terminal",
            Self::Command => "command",
        }
    }
}

/// Shared activity record; refreshed by any instance's user interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Unix millis of the last recorded interaction
    pub last_active_time: i64,
    pub owner_instance_id: String,
    /// Interactions within the counting window, capped
    pub recent_activity_count: u32,
    pub last_activity_kind: ActivityKind,
}

impl ActivityRecord {
    /// Next record after an interaction at `now`.
    ///
    /// The counter resets to 1 when the gap since the previous interaction
    /// exceeds `window_ms`, otherwise it increments up to `cap`.
    pub fn advance(
        previous: Option<&Self>,
        instance_id: &str,
        kind: ActivityKind,
        now: i64,
        window_ms: i64,
        cap: u32,
    ) -> Self {
        let recent_activity_count = match previous {
            Some(prev) if now.saturating_sub(prev.last_active_time) <= window_ms => {
                prev.recent_activity_count.saturating_add(1).min(cap)
            },
            _ => 1,
        };
        Self {
            last_active_time: now,
            owner_instance_id: instance_id.to_string(),
            recent_activity_count,
            last_activity_kind: kind,
        }
    }
}
