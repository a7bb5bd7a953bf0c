//! Top-level task service.
//!
//! Owns the registry and the collaborators every task shares, and runs the
//! two process-wide sweeps: the watchdog and the periodic snapshot save.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use courier_core::{
    CourierError, CredentialStore, SessionClient, TaskDetails, TaskEvent, TaskId, TaskInput,
    TaskLimits, TaskState,
};
use courier_logging::{AuditLog, TaskAuditEvent};
use courier_scheduler::{DeliveryPlan, TaskDeps, TaskHandle, TaskRegistry};

use crate::error::StoreError;
use crate::store::{TaskSnapshots, TaskStore};
use crate::watchdog::Watchdog;

/// Log events buffered per subscriber before the slowest one starts lagging.
const EVENT_BUFFER: usize = 1024;

/// Result of a task submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub task_id: TaskId,
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Tasks scheduled to start again after the grace delay.
    pub resumed: usize,
}

pub struct Supervisor {
    registry: TaskRegistry,
    deps: TaskDeps,
    store: Arc<dyn TaskStore>,
    /// Held from snapshot to write, so an older snapshot never lands last.
    save_lock: Mutex<()>,
}

impl Supervisor {
    pub fn new(
        client: Arc<dyn SessionClient>,
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn TaskStore>,
        limits: TaskLimits,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let deps = TaskDeps {
            client,
            credentials,
            delivery: Arc::new(DeliveryPlan::from_limits(&limits)),
            limits,
            events,
        };
        Self {
            registry: TaskRegistry::new(),
            deps,
            store,
            save_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &TaskLimits {
        &self.deps.limits
    }

    /// Log feed of every task. Consumers filter by task ID.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.deps.events.subscribe()
    }

    /// Create a task and start it. A task that fails to start is not kept.
    pub async fn submit(&self, input: TaskInput) -> Submission {
        let task_id = Uuid::new_v4();
        let recipient_id = input.recipient_id.clone();
        let state = TaskState::new(task_id, input, &self.deps.limits);
        let messages = state.message_data.messages.len();
        let (handle, _join) = TaskHandle::spawn(state, self.deps.clone());

        match handle.start().await {
            Ok(()) => {
                self.registry.insert(handle).await;
                info!(task_id = %task_id, "New task started");
                AuditLog::record(
                    task_id,
                    TaskAuditEvent::Submitted {
                        recipient_id,
                        messages,
                    },
                );
                self.save_logged().await;
                Submission {
                    task_id,
                    started: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Task failed to start");
                if let Err(cleanup) = self.deps.credentials.remove(task_id).await {
                    debug!(task_id = %task_id, error = %cleanup, "Credential cleanup failed");
                }
                AuditLog::record(
                    task_id,
                    TaskAuditEvent::Rejected {
                        reason: e.to_string(),
                    },
                );
                Submission {
                    task_id,
                    started: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Stop a task on operator request, forget it and save right away.
    pub async fn stop(&self, id: TaskId) -> Result<TaskDetails, CourierError> {
        let handle = self
            .registry
            .get(&id)
            .await
            .ok_or(CourierError::TaskNotFound(id))?;
        info!(task_id = %id, "Stopping task");
        handle.stop().await?;
        let details = handle.details().await;
        self.registry.remove(&id).await;
        AuditLog::record(id, TaskAuditEvent::Stopped);
        self.save_logged().await;
        Ok(details)
    }

    pub async fn details(&self, id: TaskId) -> Result<TaskDetails, CourierError> {
        let handle = self
            .registry
            .get(&id)
            .await
            .ok_or(CourierError::TaskNotFound(id))?;
        Ok(handle.details().await)
    }

    pub async fn list(&self) -> Vec<TaskDetails> {
        let mut all = Vec::new();
        for handle in self.registry.handles().await {
            all.push(handle.details().await);
        }
        all.sort_by_key(|d| d.task_id);
        all
    }

    /// Write every running task to the store. Returns how many were written.
    pub async fn save(&self) -> Result<usize, StoreError> {
        let _guard = self.save_lock.lock().await;
        let keep = self.deps.limits.persisted_logs;
        let mut tasks = TaskSnapshots::new();
        for handle in self.registry.handles().await {
            if handle.is_running().await {
                tasks.insert(handle.id(), handle.snapshot(keep).await);
            }
        }
        self.store.save(&tasks).await?;
        Ok(tasks.len())
    }

    async fn save_logged(&self) {
        match self.save().await {
            Ok(count) => debug!(tasks = count, "Tasks saved"),
            Err(e) => error!(error = %e, "Error saving tasks"),
        }
    }

    /// Rebuild tasks from the store. Entries that were running start again
    /// once the grace delay has passed; the outcome of that start is only
    /// logged.
    pub async fn restore(&self) -> Result<RestoreReport, StoreError> {
        let snapshots = self.store.load().await?;
        let grace = self.deps.limits.resume_grace;
        let mut report = RestoreReport::default();

        for (id, snapshot) in snapshots {
            let resume = snapshot.config.running;
            let state = TaskState::restore(id, snapshot, &self.deps.limits);
            let (handle, _join) = TaskHandle::spawn(state, self.deps.clone());
            self.registry.insert(handle.clone()).await;
            report.restored += 1;
            info!(task_id = %id, resume, "Reloaded persistent task");
            AuditLog::record(id, TaskAuditEvent::Restored { resumed: resume });

            if resume {
                report.resumed += 1;
                tokio::spawn(async move {
                    time::sleep(grace).await;
                    match handle.start().await {
                        Ok(()) => info!(task_id = %handle.id(), "Resumed task"),
                        Err(e) => warn!(task_id = %handle.id(), error = %e, "Resumed task failed to start"),
                    }
                });
            }
        }
        Ok(report)
    }

    /// Spawn the watchdog and the periodic save. Both end when `shutdown`
    /// flips to true.
    pub fn spawn_background(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let watchdog = Watchdog::new(self.registry.clone(), &self.deps.limits);
        vec![
            tokio::spawn(watchdog.run(shutdown.clone())),
            tokio::spawn(Arc::clone(self).persist_loop(shutdown)),
        ]
    }

    async fn persist_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.deps.limits.persist_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.save_logged().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Persistence loop stopped");
    }

    /// Final save before the process exits.
    pub async fn shutdown(&self) {
        match self.save().await {
            Ok(count) => info!(tasks = count, "Saved tasks before shutdown"),
            Err(e) => error!(error = %e, "Failed to save tasks before shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use courier_core::{MessageBody, TaskPhase};
    use courier_scheduler::testing::{input, wait_for, ScriptedClient, SendRule};
    use tempfile::TempDir;

    use crate::credentials::FileCredentialStore;
    use crate::store::FileTaskStore;

    struct Fixture {
        dir: TempDir,
        client: Arc<ScriptedClient>,
        supervisor: Arc<Supervisor>,
    }

    impl Fixture {
        fn new(rule: SendRule) -> Self {
            let dir = TempDir::new().unwrap();
            let client = ScriptedClient::new(rule);
            let supervisor = Self::supervisor_in(&dir, &client);
            Self {
                dir,
                client,
                supervisor,
            }
        }

        fn supervisor_in(dir: &TempDir, client: &Arc<ScriptedClient>) -> Arc<Supervisor> {
            Arc::new(Supervisor::new(
                client.clone(),
                Arc::new(FileCredentialStore::new(dir.path().join("credentials"))),
                Arc::new(FileTaskStore::new(dir.path().join("tasks.json"))),
                TaskLimits::default(),
            ))
        }

        fn store(&self) -> FileTaskStore {
            FileTaskStore::new(self.dir.path().join("tasks.json"))
        }

        async fn handle(&self, id: TaskId) -> TaskHandle {
            self.supervisor.registry().get(&id).await.unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn submit_starts_and_registers() {
        let fx = Fixture::new(SendRule::always_ok());
        let submission = fx.supervisor.submit(input("a\nb", "t_1")).await;

        assert!(submission.started);
        assert!(submission.error.is_none());
        let handle = fx.handle(submission.task_id).await;
        wait_for(&handle, |d| d.sent >= 1).await;
        assert_eq!(fx.client.login_count(), 1);

        let list = fx.supervisor.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].task_id, submission.task_id);
        assert!(fx
            .dir
            .path()
            .join("credentials")
            .join(format!("credential_{}.txt", submission.task_id))
            .exists());
        assert!(fx.store().load().await.unwrap().contains_key(&submission.task_id));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_is_not_kept() {
        let fx = Fixture::new(SendRule::always_ok());
        let submission = fx.supervisor.submit(input(" \n\n", "t_1")).await;

        assert!(!submission.started);
        assert_eq!(submission.error.as_deref(), Some("message set is empty"));
        assert!(fx.supervisor.registry().is_empty().await);
        assert!(!fx
            .dir
            .path()
            .join("credentials")
            .join(format!("credential_{}.txt", submission.task_id))
            .exists());
        assert!(matches!(
            fx.supervisor.details(submission.task_id).await,
            Err(CourierError::TaskNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_logs_reach_subscribers() {
        let fx = Fixture::new(SendRule::always_ok());
        let mut events = fx.supervisor.subscribe();
        let submission = fx.supervisor.submit(input("", "t_1")).await;

        let mut messages = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.task_id, submission.task_id);
            messages.push(event.message);
        }
        assert!(messages.iter().any(|m| m == "No messages found to send"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_forgets_task_and_clears_credential() {
        let fx = Fixture::new(SendRule::always_ok());
        let id = fx.supervisor.submit(input("a", "t_1")).await.task_id;
        wait_for(&fx.handle(id).await, |d| d.sent >= 1).await;

        let details = fx.supervisor.stop(id).await.unwrap();
        assert!(!details.running);
        assert_eq!(details.phase, TaskPhase::Stopped);
        assert!(fx.supervisor.registry().is_empty().await);
        assert!(fx.store().load().await.unwrap().is_empty());
        assert!(!fx
            .dir
            .path()
            .join("credentials")
            .join(format!("credential_{id}.txt"))
            .exists());

        assert!(matches!(
            fx.supervisor.stop(id).await,
            Err(CourierError::TaskNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn saves_racing_a_stop_never_bring_the_task_back() {
        let fx = Fixture::new(SendRule::always_ok());
        let id = fx.supervisor.submit(input("a", "t_1")).await.task_id;

        let mut saves = Vec::new();
        for _ in 0..4 {
            let supervisor = fx.supervisor.clone();
            saves.push(tokio::spawn(async move { supervisor.save().await }));
        }
        fx.supervisor.stop(id).await.unwrap();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        assert!(!fx.store().load().await.unwrap().contains_key(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn save_keeps_only_running_tasks() {
        let fx = Fixture::new(SendRule::always_ok());
        let keep = fx.supervisor.submit(input("a", "t_1")).await.task_id;
        let halt = fx.supervisor.submit(input("b", "t_2")).await.task_id;
        fx.handle(halt).await.stop().await.unwrap();
        // enough sends to fill the in-memory log past the persisted count
        let details = wait_for(&fx.handle(keep).await, |d| d.sent >= 60).await;
        assert_eq!(details.logs.len(), 100);

        assert_eq!(fx.supervisor.save().await.unwrap(), 1);
        let saved = fx.store().load().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[&keep].logs.len(), 50);
        assert!(!saved.contains_key(&halt));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_resumes_after_grace_from_saved_cursor() {
        let fx = Fixture::new(SendRule::always_ok());
        let id = fx.supervisor.submit(input("one\ntwo\nthree", "t_1")).await.task_id;
        let before = wait_for(&fx.handle(id).await, |d| d.sent == 1).await;
        // inside the inter-message delay, so the cursor has moved on
        time::sleep(Duration::from_secs(1)).await;
        fx.supervisor.save().await.unwrap();

        // a fresh process over the same data directory
        let client = ScriptedClient::new(SendRule::always_ok());
        let revived = Fixture::supervisor_in(&fx.dir, &client);
        let report = revived.restore().await.unwrap();
        assert_eq!(report, RestoreReport { restored: 1, resumed: 1 });

        let handle = revived.registry().get(&id).await.unwrap();
        assert!(!handle.is_running().await);
        assert_eq!(client.login_count(), 0);

        time::sleep(Duration::from_secs(6)).await;
        let after = wait_for(&handle, |d| d.sent > before.sent).await;
        assert!(after.running);
        assert_eq!(client.session().sent()[0].0, MessageBody::Plain("A two B".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_of_unreadable_file_is_an_error() {
        let fx = Fixture::new(SendRule::always_ok());
        std::fs::write(fx.dir.path().join("tasks.json"), "[[[").unwrap();
        assert!(fx.supervisor.restore().await.is_err());
        assert!(fx.supervisor.registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loops_persist_and_stop() {
        let fx = Fixture::new(SendRule::always_ok());
        let (tx, rx) = watch::channel(false);
        let loops = fx.supervisor.spawn_background(rx);

        let id = fx.supervisor.submit(input("a", "t_1")).await.task_id;
        // drop the file written on submit; the next periodic save rewrites it
        std::fs::remove_file(fx.dir.path().join("tasks.json")).unwrap();
        time::sleep(Duration::from_secs(31)).await;
        assert!(fx.store().load().await.unwrap().contains_key(&id));

        tx.send(true).unwrap();
        for join in loops {
            join.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_saves_running_tasks() {
        let fx = Fixture::new(SendRule::always_ok());
        let id = fx.supervisor.submit(input("a", "t_1")).await.task_id;
        std::fs::remove_file(fx.dir.path().join("tasks.json")).unwrap();
        fx.supervisor.shutdown().await;
        assert!(fx.store().load().await.unwrap().contains_key(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn details_of_unknown_task() {
        let fx = Fixture::new(SendRule::always_ok());
        assert!(matches!(
            fx.supervisor.details(Uuid::new_v4()).await,
            Err(CourierError::TaskNotFound(_))
        ));
    }
}
