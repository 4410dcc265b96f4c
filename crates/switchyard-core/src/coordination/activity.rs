//! End-user activity tracking.
//!
//! Any instance's genuine user interaction refreshes one shared
//! [`ActivityRecord`]; the leader reads it to decide whether background work
//! is worth running. Raw UI signals are filtered first so that programmatic
//! and bulk events (auto-format, scripted selections, background windows) do
//! not count as a user being present.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{ActivityConfig, ActivityKind, ActivityRecord};

use super::clock::Clock;
use crate::error::AppResult;
use crate::modules::store::{get_json, set_json, SharedStore};

/// Origin of a selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Keyboard,
    Mouse,
    Command,
    Programmatic,
}

/// Raw interaction signal as reported by the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    WindowFocus { focused: bool },
    SelectionChange { source: SelectionSource },
    TextEdit { changed_chars: usize },
    TerminalInput,
    CommandInvoked,
}

/// Map a raw signal to an activity kind, or `None` when the signal is not
/// evidence of a user at the keyboard.
pub fn classify_signal(signal: ActivitySignal, bulk_edit_threshold: usize) -> Option<ActivityKind> {
    match signal {
        ActivitySignal::WindowFocus { focused: true } => Some(ActivityKind::WindowFocus),
        ActivitySignal::WindowFocus { focused: false } => None,
        ActivitySignal::SelectionChange {
            source: SelectionSource::Keyboard | SelectionSource::Mouse,
        } => Some(ActivityKind::Selection),
        ActivitySignal::SelectionChange { .. } => None,
        ActivitySignal::TextEdit { changed_chars } => {
            (changed_chars > 0 && changed_chars < bulk_edit_threshold)
                .then_some(ActivityKind::TextEdit)
        },
        ActivitySignal::TerminalInput => Some(ActivityKind::Terminal),
        ActivitySignal::CommandInvoked => Some(ActivityKind::Command),
    }
}

struct CachedRecord {
    fetched_at: i64,
    record: Option<ActivityRecord>,
}

pub struct ActivityTracker {
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    instance_id: String,
    config: ActivityConfig,
    last_recorded: DashMap<ActivityKind, i64>,
    cache: Mutex<Option<CachedRecord>>,
}

impl ActivityTracker {
    pub fn new(
        store: Arc<dyn SharedStore>,
        clock: Arc<dyn Clock>,
        instance_id: impl Into<String>,
        config: ActivityConfig,
    ) -> Self {
        Self {
            store,
            clock,
            instance_id: instance_id.into(),
            config,
            last_recorded: DashMap::new(),
            cache: Mutex::new(None),
        }
    }

    /// Filter a raw signal and record it if it counts.
    /// Returns whether a record was written.
    pub async fn record_signal(&self, signal: ActivitySignal) -> AppResult<bool> {
        match classify_signal(signal, self.config.bulk_edit_threshold) {
            Some(kind) => self.record_activity(kind).await,
            None => Ok(false),
        }
    }

    /// Record an interaction of `kind`. No-op (returns `false`) while the
    /// previous record of the same kind is younger than its throttle window.
    pub async fn record_activity(&self, kind: ActivityKind) -> AppResult<bool> {
        let now = self.clock.now_millis();
        {
            let mut stamp = self.last_recorded.entry(kind).or_insert(i64::MIN);
            if now.saturating_sub(*stamp) < kind.throttle_window_ms() {
                return Ok(false);
            }
            *stamp = now;
        }

        let previous = match get_json::<ActivityRecord>(self.store.as_ref(), &self.config.activity_key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("[Activity] Read before write failed: {}", e);
                None
            },
        };

        let record = ActivityRecord::advance(
            previous.as_ref(),
            &self.instance_id,
            kind,
            now,
            self.config.counting_window_ms as i64,
            self.config.max_recent_count,
        );

        if let Err(e) = set_json(self.store.as_ref(), &self.config.activity_key, &record).await {
            // Let the next signal of this kind try again.
            self.last_recorded.remove(&kind);
            return Err(e.into());
        }

        tracing::trace!(
            "[Activity] {} recorded (recent count {})",
            kind.as_str(),
            record.recent_activity_count
        );
        *self.cache.lock() = Some(CachedRecord { fetched_at: now, record: Some(record) });
        Ok(true)
    }

    /// Shared record, reusing a recent read within the cache TTL.
    pub async fn current_record(&self) -> Option<ActivityRecord> {
        let now = self.clock.now_millis();
        let cached = {
            let guard = self.cache.lock();
            guard.as_ref().map(|c| (c.fetched_at, c.record.clone()))
        };
        if let Some((fetched_at, record)) = &cached {
            if now.saturating_sub(*fetched_at) < self.config.cache_ttl_ms as i64 {
                return record.clone();
            }
        }

        match get_json::<ActivityRecord>(self.store.as_ref(), &self.config.activity_key).await {
            Ok(record) => {
                *self.cache.lock() = Some(CachedRecord { fetched_at: now, record: record.clone() });
                record
            },
            Err(e) => {
                tracing::warn!("[Activity] Failed to read shared activity record: {}", e);
                cached.and_then(|(_, record)| record)
            },
        }
    }

    /// Time since the last recorded interaction on any instance;
    /// `Duration::MAX` when nothing was ever recorded.
    pub async fn inactive_time(&self) -> Duration {
        let Some(record) = self.current_record().await else {
            return Duration::MAX;
        };
        let elapsed = self.clock.now_millis().saturating_sub(record.last_active_time).max(0);
        Duration::from_millis(elapsed as u64)
    }

    /// Whether a user interacted within the inactivity timeout.
    pub async fn is_user_active(&self) -> bool {
        self.inactive_time().await <= Duration::from_millis(self.config.inactivity_timeout_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::coordination::clock::ManualClock;
    use crate::modules::store::MemoryStore;

    fn tracker(store: Arc<MemoryStore>, clock: Arc<ManualClock>, id: &str) -> ActivityTracker {
        ActivityTracker::new(store, clock, id, ActivityConfig::default())
    }

    #[test]
    fn test_classify_filters_programmatic_signals() {
        assert_eq!(
            classify_signal(ActivitySignal::WindowFocus { focused: true }, 100),
            Some(ActivityKind::WindowFocus)
        );
        assert_eq!(classify_signal(ActivitySignal::WindowFocus { focused: false }, 100), None);
        assert_eq!(
            classify_signal(
                ActivitySignal::SelectionChange { source: SelectionSource::Programmatic },
                100
            ),
            None
        );
        assert_eq!(
            classify_signal(ActivitySignal::SelectionChange { source: SelectionSource::Mouse }, 100),
            Some(ActivityKind::Selection)
        );
        assert_eq!(classify_signal(ActivitySignal::TextEdit { changed_chars: 3 }, 100), Some(ActivityKind::TextEdit));
        assert_eq!(classify_signal(ActivitySignal::TextEdit { changed_chars: 4000 }, 100), None);
        assert_eq!(classify_signal(ActivitySignal::TextEdit { changed_chars: 0 }, 100), None);
    }

    #[tokio::test]
    async fn test_no_record_means_inactive_forever() {
        let t = tracker(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)), "a");
        assert_eq!(t.inactive_time().await, Duration::MAX);
        assert!(!t.is_user_active().await);
    }

    #[tokio::test]
    async fn test_throttle_per_kind() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let t = tracker(Arc::new(MemoryStore::new()), clock.clone(), "a");

        assert!(t.record_activity(ActivityKind::TextEdit).await.unwrap());
        clock.advance(1_000);
        assert!(!t.record_activity(ActivityKind::TextEdit).await.unwrap());
        // Different kind has its own window.
        assert!(t.record_activity(ActivityKind::Selection).await.unwrap());
        clock.advance(1_000);
        assert!(t.record_activity(ActivityKind::TextEdit).await.unwrap());
    }

    #[tokio::test]
    async fn test_activity_is_shared_across_instances() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let editor_a = tracker(store.clone(), clock.clone(), "a");
        let editor_b = tracker(store.clone(), clock.clone(), "b");

        editor_b.record_signal(ActivitySignal::CommandInvoked).await.unwrap();
        assert!(editor_a.is_user_active().await);

        let record = editor_a.current_record().await.unwrap();
        assert_eq!(record.owner_instance_id, "b");
        assert_eq!(record.last_activity_kind, ActivityKind::Command);
    }

    #[tokio::test]
    async fn test_becomes_inactive_after_timeout() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let t = tracker(store, clock.clone(), "a");

        t.record_activity(ActivityKind::Terminal).await.unwrap();
        clock.advance(29 * 60 * 1000);
        assert!(t.is_user_active().await);
        clock.advance(2 * 60 * 1000);
        assert!(!t.is_user_active().await);
        assert!(t.inactive_time().await >= Duration::from_secs(31 * 60));
    }

    #[tokio::test]
    async fn test_cache_hides_remote_writes_until_ttl() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let reader = tracker(store.clone(), clock.clone(), "reader");
        let writer = tracker(store.clone(), clock.clone(), "writer");

        assert!(reader.current_record().await.is_none());
        writer.record_activity(ActivityKind::WindowFocus).await.unwrap();
        assert!(reader.current_record().await.is_none());

        clock.advance(3_000);
        assert!(reader.current_record().await.is_some());
    }
}
