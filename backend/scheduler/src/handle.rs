use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use courier_core::{TaskDetails, TaskError, TaskId, TaskPhase, TaskSnapshot, TaskState};

use crate::task::{TaskActor, TaskCommand, TaskDeps};

/// Commands queued per task before senders wait.
const COMMAND_BUFFER: usize = 16;

/// Cloneable handle to a running task actor.
///
/// Reads (`details`, `snapshot`, staleness) take a short read lock on the
/// task's state; everything that changes the lifecycle goes through the
/// actor's command channel.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    state: Arc<RwLock<TaskState>>,
    commands: mpsc::Sender<TaskCommand>,
}

impl TaskHandle {
    /// Spawn the actor for `state`. The task stays idle until [`start`](Self::start).
    pub fn spawn(state: TaskState, deps: TaskDeps) -> (Self, JoinHandle<()>) {
        let id = state.id;
        let state = Arc::new(RwLock::new(state));
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = TaskActor::new(Arc::clone(&state), id, deps, rx);
        let join = tokio::spawn(actor.run());
        (
            Self {
                id,
                state,
                commands: tx,
            },
            join,
        )
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Persist the credential, check the message set and begin logging in.
    /// Succeeds without side effects if the task is already running.
    pub async fn start(&self) -> Result<(), TaskError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(TaskCommand::Start { reply })
            .await
            .map_err(|_| TaskError::ActorGone)?;
        rx.await.map_err(|_| TaskError::ActorGone)?
    }

    /// Stop the task. The `running` flag flips before the actor is told, so
    /// any step that wakes up in between already sees it.
    pub async fn stop(&self) -> Result<(), TaskError> {
        self.state.write().await.config.running = false;
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(TaskCommand::Stop { reply })
            .await
            .map_err(|_| TaskError::ActorGone)?;
        rx.await.map_err(|_| TaskError::ActorGone)
    }

    /// Ask the actor to drop its session and log in again.
    pub async fn restart(&self, reason: impl Into<String>) -> Result<(), TaskError> {
        self.commands
            .send(TaskCommand::Restart {
                reason: reason.into(),
            })
            .await
            .map_err(|_| TaskError::ActorGone)
    }

    pub async fn details(&self) -> TaskDetails {
        self.state.read().await.details(Utc::now())
    }

    pub async fn snapshot(&self, log_limit: usize) -> TaskSnapshot {
        self.state.read().await.snapshot(log_limit)
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.config.running
    }

    pub async fn phase(&self) -> TaskPhase {
        self.state.read().await.phase
    }

    /// Running, but nothing logged for longer than `threshold`.
    pub async fn is_stuck(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let state = self.state.read().await;
        state.config.running && state.is_stale(now, threshold)
    }
}
