//! Retention reaping for terminal executions.
//!
//! After an execution reaches a terminal state, its connection and registry
//! entry are reclaimed once the retention delay elapses. Scheduling goes
//! through the `ReapScheduler` trait so the strategy is testable without
//! wall-clock waits.

use crate::db::DbConnection;
use crate::query::registry::ExecutionRegistry;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Runs a deferred task after a delay.
pub trait ReapScheduler: Send + Sync {
    /// Schedules `task` to run once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>);
}

/// Production scheduler: a spawned tokio task sleeping out the delay.
#[derive(Debug, Default)]
pub struct TokioReapScheduler;

impl ReapScheduler for TokioReapScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}

/// Test scheduler: queues tasks for explicit draining.
///
/// Lets tests trigger "the retention delay elapsed" deterministically via
/// `run_pending`, without sleeping.
#[derive(Default)]
pub struct ManualReapScheduler {
    pending: Mutex<Vec<(Duration, BoxFuture<'static, ()>)>>,
}

impl ManualReapScheduler {
    /// Creates a scheduler with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Runs every queued task to completion, in scheduling order.
    pub async fn run_pending(&self) {
        let tasks: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        for (_, task) in tasks {
            task.await;
        }
    }
}

impl ReapScheduler for ManualReapScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) {
        self.pending.lock().unwrap().push((delay, task));
    }
}

/// Schedules the one reap for an execution: release its connection and drop
/// its registry entry after the retention delay.
///
/// Release failures are best-effort and only logged; removal of an entry
/// that is already gone is a no-op.
pub fn schedule_reap(
    scheduler: &dyn ReapScheduler,
    registry: Arc<ExecutionRegistry>,
    id: Uuid,
    connection: Box<dyn DbConnection>,
    delay: Duration,
) {
    let task = async move {
        if let Err(e) = connection.release().await {
            warn!("Failed to release connection for query {id}: {e}");
        }
        if registry.remove(&id) {
            info!("Cleaned up query {id}");
        }
    };
    scheduler.schedule(delay, Box::pin(task));
}
