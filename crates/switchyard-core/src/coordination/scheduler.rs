//! Leader-only periodic task registry.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

type TaskFn = dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync;

/// Named async job run once per periodic cycle on the leader.
#[derive(Clone)]
pub struct PeriodicTask {
    name: String,
    run: Arc<TaskFn>,
}

impl PeriodicTask {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
    {
        Self { name: name.into(), run: Arc::new(move || f().boxed()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask").field("name", &self.name).finish()
    }
}

/// Outcome of one periodic cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub ran: usize,
    pub failed: usize,
    pub skipped_inactive: bool,
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<Vec<PeriodicTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: PeriodicTask) {
        tracing::debug!("[Scheduler] Registered periodic task '{}'", task.name);
        self.tasks.write().push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Run every registered task once, in registration order.
    ///
    /// Tasks run one after another, never concurrently. A task that errors or
    /// panics is logged and counted; the remaining tasks still run. Nothing is
    /// retried within the cycle.
    pub async fn run_batch(&self, user_active: bool) -> BatchReport {
        if !user_active {
            tracing::debug!("[Scheduler] User inactive, skipping periodic batch");
            return BatchReport { skipped_inactive: true, ..BatchReport::default() };
        }

        let tasks = self.tasks.read().clone();
        let mut report = BatchReport::default();

        for task in tasks {
            report.ran += 1;
            match AssertUnwindSafe((task.run)()).catch_unwind().await {
                Ok(Ok(())) => {
                    tracing::trace!("[Scheduler] Task '{}' completed", task.name);
                },
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!("[Scheduler] Task '{}' failed: {}", task.name, e);
                },
                Err(_) => {
                    report.failed += 1;
                    tracing::error!("[Scheduler] Task '{}' panicked", task.name);
                },
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(name: &str, hits: Arc<AtomicUsize>) -> PeriodicTask {
        PeriodicTask::new(name, move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_batch() {
        let registry = TaskRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.register(counting("first", hits.clone()));
        registry.register(PeriodicTask::new("broken", || async { Err("boom".to_string()) }));
        registry.register(PeriodicTask::new("panics", || async { panic!("task panic") }));
        registry.register(counting("last", hits.clone()));

        let report = registry.run_batch(true).await;
        assert_eq!(report, BatchReport { ran: 4, failed: 2, skipped_inactive: false });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inactive_user_skips_whole_batch() {
        let registry = TaskRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.register(counting("only", hits.clone()));

        let report = registry.run_batch(false).await;
        assert!(report.skipped_inactive);
        assert_eq!(report.ran, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
