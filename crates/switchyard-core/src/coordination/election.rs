//! Leader election over the shared store.
//!
//! There is no compare-and-swap, so an election is an optimistic write
//! followed by a read-back after a short settle delay. Two instances can
//! both believe they lead for at most one heartbeat interval; the next cycle
//! demotes whichever no longer owns the stored record.

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{ElectionConfig, LeaderRecord, LeadershipRole, LeadershipStatus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::activity::ActivityTracker;
use super::clock::Clock;
use super::scheduler::{BatchReport, PeriodicTask, TaskRegistry};
use crate::modules::logger::{log_info, log_warn};
use crate::modules::store::{get_json, set_json, SharedStore};
use crate::telemetry;
use crate::utils::cancel::sleep_or_cancel;

/// What a heartbeat cycle should do given the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// No live leader: write our own claim.
    Elect,
    /// We own the record: bump our heartbeat.
    Refresh,
    /// Someone else leads and is alive.
    Follow { leader_id: String },
}

pub fn evaluate_heartbeat(
    record: Option<&LeaderRecord>,
    self_id: &str,
    now: i64,
    leader_timeout_ms: i64,
) -> HeartbeatAction {
    match record {
        None => HeartbeatAction::Elect,
        Some(r) if r.is_owned_by(self_id) => HeartbeatAction::Refresh,
        Some(r) if r.is_alive(now, leader_timeout_ms) => {
            HeartbeatAction::Follow { leader_id: r.instance_id.clone() }
        },
        Some(_) => HeartbeatAction::Elect,
    }
}

/// Result of reading the record back after an election write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// Our write is the stored one.
    Won,
    /// A competitor's write with the same `elected_at` is stored, but our id
    /// sorts first. Our claim must be written again.
    WonTieBreak,
    Lost { leader_id: Option<String> },
}

pub fn resolve_election(read_back: Option<&LeaderRecord>, self_write: &LeaderRecord) -> ElectionOutcome {
    match read_back {
        None => ElectionOutcome::Lost { leader_id: None },
        Some(r) if r.is_owned_by(&self_write.instance_id) => ElectionOutcome::Won,
        Some(r)
            if r.elected_at == self_write.elected_at
                && self_write.instance_id < r.instance_id =>
        {
            ElectionOutcome::WonTieBreak
        },
        Some(r) => ElectionOutcome::Lost { leader_id: Some(r.instance_id.clone()) },
    }
}

#[derive(Debug, Default)]
struct ElectorState {
    role: LeadershipRole,
    leader_id: Option<String>,
    elected_at: Option<i64>,
}

pub struct LeaderElector {
    instance_id: String,
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    config: ElectionConfig,
    activity: Option<Arc<ActivityTracker>>,
    tasks: TaskRegistry,
    state: RwLock<ElectorState>,
    // Heartbeat cycles never overlap within one instance.
    cycle_lock: tokio::sync::Mutex<()>,
    shutdown: Mutex<Option<CancellationToken>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl LeaderElector {
    /// `activity` gates the periodic batch; without it the user always
    /// counts as active.
    pub fn new(
        instance_id: impl Into<String>,
        store: Arc<dyn SharedStore>,
        clock: Arc<dyn Clock>,
        config: ElectionConfig,
        activity: Option<Arc<ActivityTracker>>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            store,
            clock,
            config,
            activity,
            tasks: TaskRegistry::new(),
            state: RwLock::new(ElectorState::default()),
            cycle_lock: tokio::sync::Mutex::new(()),
            shutdown: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn is_leader(&self) -> bool {
        self.state.read().role == LeadershipRole::Leader
    }

    pub fn status(&self) -> LeadershipStatus {
        let state = self.state.read();
        LeadershipStatus {
            instance_id: self.instance_id.clone(),
            role: state.role,
            leader_id: state.leader_id.clone(),
            elected_at: state.elected_at,
        }
    }

    pub fn register_periodic_task(&self, task: PeriodicTask) {
        self.tasks.register(task);
    }

    /// One heartbeat cycle. Returns the role held afterwards.
    pub async fn run_cycle(&self) -> LeadershipRole {
        self.run_cycle_with(&CancellationToken::new()).await
    }

    async fn run_cycle_with(&self, cancel: &CancellationToken) -> LeadershipRole {
        let _cycle = self.cycle_lock.lock().await;
        let now = self.clock.now_millis();

        let record = match get_json::<LeaderRecord>(self.store.as_ref(), &self.config.leader_key).await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("[Election] Failed to read leader record: {}", e);
                return self.role();
            },
        };

        match evaluate_heartbeat(
            record.as_ref(),
            &self.instance_id,
            now,
            self.config.leader_timeout_ms as i64,
        ) {
            HeartbeatAction::Refresh => {
                let elected_at = record.as_ref().map_or(now, |r| r.elected_at);
                let refreshed = LeaderRecord {
                    instance_id: self.instance_id.clone(),
                    last_heartbeat: now,
                    elected_at,
                };
                if let Err(e) = set_json(self.store.as_ref(), &self.config.leader_key, &refreshed).await {
                    // Not fatal: a later cycle that reads back a stale record
                    // lets another instance take over.
                    tracing::warn!("[Election] Heartbeat write failed: {}", e);
                }
                self.become_leader(elected_at)
            },
            HeartbeatAction::Follow { leader_id } => self.become_follower(Some(leader_id)),
            HeartbeatAction::Elect => self.attempt_election(now, cancel).await,
        }
    }

    async fn attempt_election(&self, now: i64, cancel: &CancellationToken) -> LeadershipRole {
        let claim = LeaderRecord::claim(self.instance_id.clone(), now);
        if let Err(e) = set_json(self.store.as_ref(), &self.config.leader_key, &claim).await {
            tracing::warn!("[Election] Election write failed: {}", e);
            return self.role();
        }

        let settle = Duration::from_millis(self.config.settle_delay_ms);
        if sleep_or_cancel(settle, cancel).await.is_cancelled() {
            return self.role();
        }

        let read_back =
            match get_json::<LeaderRecord>(self.store.as_ref(), &self.config.leader_key).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("[Election] Read-back failed: {}", e);
                    None
                },
            };

        match resolve_election(read_back.as_ref(), &claim) {
            ElectionOutcome::Won => self.become_leader(claim.elected_at),
            ElectionOutcome::WonTieBreak => {
                tracing::debug!(
                    "[Election] Tie on electedAt={}, {} wins by id order",
                    claim.elected_at,
                    self.instance_id
                );
                if let Err(e) = set_json(self.store.as_ref(), &self.config.leader_key, &claim).await {
                    tracing::warn!("[Election] Tie-break rewrite failed: {}", e);
                }
                self.become_leader(claim.elected_at)
            },
            ElectionOutcome::Lost { leader_id } => self.become_follower(leader_id),
        }
    }

    fn role(&self) -> LeadershipRole {
        self.state.read().role
    }

    fn become_leader(&self, elected_at: i64) -> LeadershipRole {
        let mut state = self.state.write();
        if state.role != LeadershipRole::Leader {
            log_info(&format!("[Election] Instance {} became leader", self.instance_id));
            telemetry::set_leader(true);
        }
        state.role = LeadershipRole::Leader;
        state.leader_id = Some(self.instance_id.clone());
        state.elected_at = Some(elected_at);
        LeadershipRole::Leader
    }

    fn become_follower(&self, leader_id: Option<String>) -> LeadershipRole {
        let mut state = self.state.write();
        if state.role == LeadershipRole::Leader {
            log_warn(&format!(
                "[Election] Instance {} lost leadership to {}",
                self.instance_id,
                leader_id.as_deref().unwrap_or("nobody")
            ));
            telemetry::set_leader(false);
        }
        state.role = LeadershipRole::Follower;
        state.leader_id = leader_id;
        LeadershipRole::Follower
    }

    /// Run the periodic batch once if this instance leads.
    /// Returns `None` on followers.
    pub async fn run_periodic(&self) -> Option<BatchReport> {
        if !self.is_leader() {
            return None;
        }
        let user_active = match &self.activity {
            Some(activity) => activity.is_user_active().await,
            None => true,
        };
        let report = self.tasks.run_batch(user_active).await;
        telemetry::record_periodic_batch(if report.skipped_inactive { "skipped_inactive" } else { "ran" });
        Some(report)
    }

    /// Spawn the heartbeat and periodic loops. A second call while running
    /// is ignored.
    pub fn start(self: &Arc<Self>) {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            tracing::warn!("[Election] Elector {} already started", self.instance_id);
            return;
        }
        let token = CancellationToken::new();
        *shutdown = Some(token.clone());

        log_info(&format!(
            "[Election] Starting elector {} (heartbeat {}ms, timeout {}ms)",
            self.instance_id, self.config.heartbeat_interval_ms, self.config.leader_timeout_ms
        ));

        let heartbeat = tokio::spawn(Arc::clone(self).heartbeat_loop(token.clone()));
        let periodic = tokio::spawn(Arc::clone(self).periodic_loop(token));
        self.handles.lock().extend([heartbeat, periodic]);
    }

    async fn heartbeat_loop(self: Arc<Self>, token: CancellationToken) {
        let jitter_ms = if self.config.startup_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.startup_jitter_ms)
        };
        if sleep_or_cancel(Duration::from_millis(jitter_ms), &token).await.is_cancelled() {
            return;
        }

        let interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        loop {
            self.run_cycle_with(&token).await;
            if sleep_or_cancel(interval, &token).await.is_cancelled() {
                break;
            }
        }
        tracing::debug!("[Election] Heartbeat loop stopped for {}", self.instance_id);
    }

    async fn periodic_loop(self: Arc<Self>, token: CancellationToken) {
        let interval = Duration::from_millis(self.config.periodic_interval_ms);
        loop {
            if sleep_or_cancel(interval, &token).await.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = self.run_periodic() => {},
            }
        }
        tracing::debug!("[Election] Periodic loop stopped for {}", self.instance_id);
    }

    /// Stop both loops and resign. The shared record is deleted only if it
    /// still names this instance, so a successor can be elected at once.
    pub async fn stop(&self) {
        let token = self.shutdown.lock().take();
        if let Some(token) = token {
            token.cancel();
        }
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("[Election] Background loop ended abnormally: {}", e);
            }
        }

        let _cycle = self.cycle_lock.lock().await;
        if !self.is_leader() {
            return;
        }
        match get_json::<LeaderRecord>(self.store.as_ref(), &self.config.leader_key).await {
            Ok(Some(record)) if record.is_owned_by(&self.instance_id) => {
                if let Err(e) = self.store.delete(&self.config.leader_key).await {
                    tracing::warn!("[Election] Failed to delete leader record on resign: {}", e);
                }
            },
            Ok(_) => {},
            Err(e) => tracing::warn!("[Election] Failed to read leader record on resign: {}", e),
        }
        self.become_follower(None);
        log_info(&format!("[Election] Instance {} resigned", self.instance_id));
    }
}

#[cfg(test)]
#[path = "election_tests.rs"]
mod election_tests;
