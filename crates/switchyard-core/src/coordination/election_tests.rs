#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::coordination::clock::ManualClock;
use crate::modules::store::{MemoryStore, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use switchyard_types::{ActivityConfig, ActivityKind};

const START: i64 = 1_700_000_000_000;

fn config() -> ElectionConfig {
    ElectionConfig { startup_jitter_ms: 0, ..ElectionConfig::default() }
}

fn elector(id: &str, store: Arc<dyn SharedStore>, clock: Arc<ManualClock>) -> Arc<LeaderElector> {
    Arc::new(LeaderElector::new(id, store, clock, config(), None))
}

async fn stored_leader(store: &dyn SharedStore) -> Option<LeaderRecord> {
    get_json::<LeaderRecord>(store, &config().leader_key).await.unwrap()
}

/// Store whose writes can be switched off to simulate an outage.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

#[async_trait]
impl SharedStore for FlakyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }
}

#[test]
fn test_evaluate_heartbeat_table() {
    let own = LeaderRecord::claim("a", START);
    let other = LeaderRecord::claim("b", START);

    assert_eq!(evaluate_heartbeat(None, "a", START, 15_000), HeartbeatAction::Elect);
    assert_eq!(evaluate_heartbeat(Some(&own), "a", START + 60_000, 15_000), HeartbeatAction::Refresh);
    assert_eq!(
        evaluate_heartbeat(Some(&other), "a", START + 15_000, 15_000),
        HeartbeatAction::Follow { leader_id: "b".to_string() }
    );
    assert_eq!(evaluate_heartbeat(Some(&other), "a", START + 15_001, 15_000), HeartbeatAction::Elect);
}

#[test]
fn test_tie_break_is_deterministic() {
    let a = LeaderRecord::claim("a", START);
    let b = LeaderRecord::claim("b", START);

    // Whichever write is stored, "a" ends up the only winner.
    assert_eq!(resolve_election(Some(&b), &a), ElectionOutcome::WonTieBreak);
    assert_eq!(resolve_election(Some(&b), &b), ElectionOutcome::Won);
    assert_eq!(resolve_election(Some(&a), &a), ElectionOutcome::Won);
    assert_eq!(
        resolve_election(Some(&a), &b),
        ElectionOutcome::Lost { leader_id: Some("a".to_string()) }
    );

    // Different electedAt is not a tie.
    let late_b = LeaderRecord::claim("b", START + 1);
    assert_eq!(
        resolve_election(Some(&late_b), &a),
        ElectionOutcome::Lost { leader_id: Some("b".to_string()) }
    );
    assert_eq!(resolve_election(None, &a), ElectionOutcome::Lost { leader_id: None });
}

#[tokio::test(start_paused = true)]
async fn test_first_instance_becomes_leader_second_follows() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let a = elector("a", store.clone(), clock.clone());
    let b = elector("b", store.clone(), clock.clone());

    assert_eq!(a.run_cycle().await, LeadershipRole::Leader);
    assert_eq!(b.run_cycle().await, LeadershipRole::Follower);

    let status = b.status();
    assert_eq!(status.leader_id.as_deref(), Some("a"));
    assert_eq!(a.status().elected_at, Some(START));
    assert_eq!(stored_leader(store.as_ref()).await.unwrap().instance_id, "a");
}

#[tokio::test(start_paused = true)]
async fn test_follower_takes_over_after_leader_goes_silent() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let a = elector("a", store.clone(), clock.clone());
    let b = elector("b", store.clone(), clock.clone());

    a.run_cycle().await;
    b.run_cycle().await;

    // "a" crashes: no more heartbeats. Within timeout + interval "b" leads.
    let mut waited = 0;
    while waited <= 15_000 + 5_000 {
        clock.advance(5_000);
        waited += 5_000;
        if b.run_cycle().await == LeadershipRole::Leader {
            break;
        }
    }
    assert!(b.is_leader());
    assert!(waited <= 20_000);

    // The old leader notices on its next cycle.
    assert_eq!(a.run_cycle().await, LeadershipRole::Follower);
    assert_eq!(a.status().leader_id.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn test_smaller_id_wins_simultaneous_claim() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let a = elector("a", store.clone(), clock.clone());

    let cycle = tokio::spawn({
        let a = a.clone();
        async move { a.run_cycle().await }
    });
    // Competitor "b" lands its claim inside a's settle window.
    tokio::time::sleep(Duration::from_millis(10)).await;
    set_json(store.as_ref(), &config().leader_key, &LeaderRecord::claim("b", START)).await.unwrap();

    assert_eq!(cycle.await.unwrap(), LeadershipRole::Leader);
    assert_eq!(stored_leader(store.as_ref()).await.unwrap().instance_id, "a");
}

#[tokio::test(start_paused = true)]
async fn test_larger_id_loses_simultaneous_claim() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let b = elector("b", store.clone(), clock.clone());

    let cycle = tokio::spawn({
        let b = b.clone();
        async move { b.run_cycle().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    set_json(store.as_ref(), &config().leader_key, &LeaderRecord::claim("a", START)).await.unwrap();

    assert_eq!(cycle.await.unwrap(), LeadershipRole::Follower);
    assert_eq!(b.status().leader_id.as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn test_many_instances_converge_to_one_leader() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let electors: Vec<_> =
        ["d", "b", "c", "a"].iter().map(|id| elector(id, store.clone(), clock.clone())).collect();

    for _ in 0..3 {
        let cycles = electors.iter().map(|e| {
            let e = e.clone();
            async move { e.run_cycle().await }
        });
        futures::future::join_all(cycles).await;
        clock.advance(5_000);
    }

    let leaders: Vec<_> = electors.iter().filter(|e| e.is_leader()).collect();
    assert_eq!(leaders.len(), 1);
    let stored = stored_leader(store.as_ref()).await.unwrap();
    assert_eq!(leaders[0].instance_id(), stored.instance_id);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_write_failure_does_not_resign() {
    let store = Arc::new(FlakyStore::default());
    let clock = Arc::new(ManualClock::new(START));
    let a = elector("a", store.clone(), clock.clone());

    assert_eq!(a.run_cycle().await, LeadershipRole::Leader);
    store.fail_writes.store(true, Ordering::SeqCst);
    clock.advance(5_000);
    assert_eq!(a.run_cycle().await, LeadershipRole::Leader);
}

#[tokio::test(start_paused = true)]
async fn test_stop_resigns_and_successor_elects_immediately() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let a = elector("a", store.clone(), clock.clone());
    let b = elector("b", store.clone(), clock.clone());

    a.run_cycle().await;
    b.run_cycle().await;
    a.stop().await;

    assert!(!a.is_leader());
    assert!(stored_leader(store.as_ref()).await.is_none());
    // No need to wait out the timeout.
    assert_eq!(b.run_cycle().await, LeadershipRole::Leader);
}

#[tokio::test(start_paused = true)]
async fn test_stop_leaves_foreign_record_alone() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let a = elector("a", store.clone(), clock.clone());

    a.run_cycle().await;
    set_json(store.as_ref(), &config().leader_key, &LeaderRecord::claim("z", START + 1))
        .await
        .unwrap();
    a.stop().await;

    assert_eq!(stored_leader(store.as_ref()).await.unwrap().instance_id, "z");
}

#[tokio::test(start_paused = true)]
async fn test_started_elector_leads_and_runs_periodic_tasks() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let a = elector("a", store.clone(), clock.clone());

    let hits = Arc::new(AtomicUsize::new(0));
    a.register_periodic_task(PeriodicTask::new("count", {
        let hits = hits.clone();
        move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }));

    a.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(a.is_leader());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    a.stop().await;
    assert!(stored_leader(store.as_ref()).await.is_none());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_batch_gated_by_leadership_and_activity() {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let activity = Arc::new(ActivityTracker::new(
        store.clone(),
        clock.clone(),
        "a",
        ActivityConfig::default(),
    ));
    let a = LeaderElector::new("a", store.clone(), clock.clone(), config(), Some(activity.clone()));
    let b = elector("b", store.clone(), clock.clone());
    a.register_periodic_task(PeriodicTask::new("noop", || async { Ok(()) }));

    a.run_cycle().await;
    b.run_cycle().await;
    assert!(b.run_periodic().await.is_none());

    // Nobody has touched the editor yet.
    let report = a.run_periodic().await.unwrap();
    assert!(report.skipped_inactive);

    activity.record_activity(ActivityKind::TextEdit).await.unwrap();
    let report = a.run_periodic().await.unwrap();
    assert_eq!(report, BatchReport { ran: 1, failed: 0, skipped_inactive: false });
}
