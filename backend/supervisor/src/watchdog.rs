//! Stuck-task watchdog.
//!
//! Every sweep looks at each registered task and forces a restart on any
//! that is marked running but has logged nothing for longer than the stale
//! threshold. The restart is a request to the task's actor; whatever the
//! task was waiting on is abandoned there, not here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use courier_core::{TaskId, TaskLimits};
use courier_logging::{AuditLog, TaskAuditEvent};
use courier_scheduler::TaskRegistry;

pub struct Watchdog {
    registry: TaskRegistry,
    interval: Duration,
    stale_after: Duration,
}

impl Watchdog {
    pub fn new(registry: TaskRegistry, limits: &TaskLimits) -> Self {
        Self {
            registry,
            interval: limits.watchdog_interval,
            stale_after: limits.stale_after,
        }
    }

    fn reason(&self) -> String {
        let secs = self.stale_after.as_secs();
        if secs >= 60 && secs % 60 == 0 {
            format!("No activity for {} minutes", secs / 60)
        } else {
            format!("No activity for {secs} seconds")
        }
    }

    /// One pass over the registry as of `now`. Returns the tasks that were
    /// asked to restart.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        let mut restarted = Vec::new();
        for handle in self.registry.handles().await {
            if !handle.is_stuck(now, self.stale_after).await {
                continue;
            }
            let idle_secs = handle.details().await.idle_ms / 1000;
            info!(task_id = %handle.id(), idle_secs, "Auto-restarting stuck task");
            match handle.restart(self.reason()).await {
                Ok(()) => {
                    AuditLog::record(handle.id(), TaskAuditEvent::WatchdogRestart { idle_secs });
                    restarted.push(handle.id());
                }
                Err(e) => warn!(task_id = %handle.id(), error = %e, "Stuck task did not accept restart"),
            }
        }
        restarted
    }

    pub async fn sweep(&self) -> Vec<TaskId> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep every interval until `shutdown` flips or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        debug!(interval_secs = self.interval.as_secs(), "Watchdog started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let restarted = self.sweep().await;
                    if !restarted.is_empty() {
                        info!(count = restarted.len(), "Watchdog sweep restarted tasks");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Watchdog stopped");
    }
}
