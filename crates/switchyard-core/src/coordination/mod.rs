//! Cross-instance coordination: leader election, activity tracking and the
//! leader-only periodic batch.

pub mod activity;
pub mod clock;
pub mod election;
pub mod scheduler;

pub use activity::{classify_signal, ActivitySignal, ActivityTracker, SelectionSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use election::{
    evaluate_heartbeat, resolve_election, ElectionOutcome, HeartbeatAction, LeaderElector,
};
pub use scheduler::{BatchReport, PeriodicTask, TaskRegistry};

use std::sync::Arc;
use switchyard_types::AppConfig;

use crate::modules::store::SharedStore;

/// One per process: the elector and the activity tracker it consults,
/// sharing a freshly generated instance id.
pub struct Coordinator {
    pub elector: Arc<LeaderElector>,
    pub activity: Arc<ActivityTracker>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn SharedStore>, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        let instance_id = uuid::Uuid::new_v4().to_string();
        let activity = Arc::new(ActivityTracker::new(
            store.clone(),
            clock.clone(),
            instance_id.clone(),
            config.activity.clone(),
        ));
        let elector = Arc::new(LeaderElector::new(
            instance_id,
            store,
            clock,
            config.election.clone(),
            Some(activity.clone()),
        ));
        Self { elector, activity }
    }

    pub fn instance_id(&self) -> &str {
        self.elector.instance_id()
    }

    pub fn start(&self) {
        self.elector.start();
    }

    pub async fn stop(&self) {
        self.elector.stop().await;
    }
}
