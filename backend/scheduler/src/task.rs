//! Per-task actor.
//!
//! One tokio task per submitted job owns the provider session and drives the
//! lifecycle `Idle -> LoggingIn -> Sending -> Restarting -> Stopped`. Every
//! wait (backoffs, retry delays, the inter-message delay, in-flight provider
//! calls) also listens on the command channel, so `stop` and forced restarts
//! take effect at the next decision point. Each step re-checks the `running`
//! flag before acting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use courier_core::{
    ClientError, CredentialStore, LoginOptions, Recipient, Session, SessionClient, Severity,
    TaskError, TaskEvent, TaskId, TaskLimits, TaskPhase, TaskState,
};
use courier_logging::redact_sensitive_data;

use crate::delivery::DeliveryPlan;

/// Collaborators shared by every task actor.
#[derive(Clone)]
pub struct TaskDeps {
    pub client: Arc<dyn SessionClient>,
    pub credentials: Arc<dyn CredentialStore>,
    pub delivery: Arc<DeliveryPlan>,
    pub limits: TaskLimits,
    pub events: broadcast::Sender<TaskEvent>,
}

#[derive(Debug)]
pub(crate) enum TaskCommand {
    Start {
        reply: oneshot::Sender<Result<(), TaskError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Restart {
        reason: String,
    },
}

/// Why a wait ended early.
enum Interrupt {
    Goto(TaskPhase),
    /// Every handle is gone; the actor shuts down.
    Exit,
}

/// Outcome of delivering one message.
enum Delivery {
    Delivered,
    GaveUp,
    Fault(ClientError),
    Cancelled,
    Interrupted(Interrupt),
}

/// Next phase to run; `None` ends the actor.
type Next = Option<TaskPhase>;

fn redirect(interrupt: Interrupt) -> Next {
    match interrupt {
        Interrupt::Goto(phase) => Some(phase),
        Interrupt::Exit => None,
    }
}

pub(crate) struct TaskActor {
    id: TaskId,
    state: Arc<RwLock<TaskState>>,
    deps: TaskDeps,
    commands: mpsc::Receiver<TaskCommand>,
    session: Option<Arc<dyn Session>>,
}

impl TaskActor {
    pub(crate) fn new(
        state: Arc<RwLock<TaskState>>,
        id: TaskId,
        deps: TaskDeps,
        commands: mpsc::Receiver<TaskCommand>,
    ) -> Self {
        Self {
            id,
            state,
            deps,
            commands,
            session: None,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut phase = self.state.read().await.phase;
        debug!(task_id = %self.id, phase = %phase, "Task actor started");

        loop {
            let next = match phase {
                TaskPhase::Idle | TaskPhase::Stopped => self.wait_for_start().await,
                TaskPhase::LoggingIn => self.login().await,
                TaskPhase::Sending => self.send_next().await,
                TaskPhase::Restarting => self.await_restart().await,
            };
            let Some(next) = next else { break };
            if next != phase {
                debug!(task_id = %self.id, from = %phase, to = %next, "Task phase change");
                self.state.write().await.phase = next;
            }
            phase = next;
        }

        debug!(task_id = %self.id, "Task actor exiting");
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn log(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        self.state.write().await.push_log(message.clone(), severity);
        match severity {
            Severity::Error => error!(task_id = %self.id, "{message}"),
            Severity::Warning => warn!(task_id = %self.id, "{message}"),
            Severity::Info | Severity::Success => info!(task_id = %self.id, "{message}"),
        }
        // No subscribers is fine.
        let _ = self.deps.events.send(TaskEvent::new(self.id, message, severity));
    }

    async fn running(&self) -> bool {
        self.state.read().await.config.running
    }

    /// Drive `fut` to completion unless a command redirects the task first.
    /// A redirect drops `fut`, abandoning the in-flight call.
    async fn guard<F: Future>(&mut self, fut: F) -> Result<F::Output, Interrupt> {
        tokio::pin!(fut);
        loop {
            let command = tokio::select! {
                biased;
                command = self.commands.recv() => command,
                out = &mut fut => return Ok(out),
            };
            if let Some(interrupt) = self.on_command(command).await {
                return Err(interrupt);
            }
        }
    }

    async fn pause(&mut self, duration: Duration) -> Result<(), Interrupt> {
        self.guard(tokio::time::sleep(duration)).await
    }

    /// Commands arriving while the task is active.
    async fn on_command(&mut self, command: Option<TaskCommand>) -> Option<Interrupt> {
        let Some(command) = command else {
            return Some(Interrupt::Exit);
        };
        match command {
            TaskCommand::Start { reply } => {
                self.log("Task is already running", Severity::Info).await;
                let _ = reply.send(Ok(()));
                None
            }
            TaskCommand::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
                Some(Interrupt::Goto(TaskPhase::Stopped))
            }
            TaskCommand::Restart { reason } => {
                if self.state.read().await.phase == TaskPhase::Restarting {
                    debug!(task_id = %self.id, "Restart already pending");
                    return None;
                }
                Some(Interrupt::Goto(self.restart(&reason).await))
            }
        }
    }

    // ------------------------------------------------------------------
    // Idle / Stopped
    // ------------------------------------------------------------------

    async fn wait_for_start(&mut self) -> Next {
        loop {
            match self.commands.recv().await? {
                TaskCommand::Start { reply } => {
                    let (result, next) = self.start().await;
                    let _ = reply.send(result);
                    return Some(next);
                }
                TaskCommand::Stop { reply } => {
                    self.stop().await;
                    let _ = reply.send(());
                    return Some(TaskPhase::Stopped);
                }
                TaskCommand::Restart { .. } => {
                    debug!(task_id = %self.id, "Ignoring restart for a task that is not running");
                }
            }
        }
    }

    async fn start(&mut self) -> (Result<(), TaskError>, TaskPhase) {
        let (credential, ceiling) = {
            let mut state = self.state.write().await;
            let config = &state.config;
            let ceiling = config.ceiling_reached.then_some(config.max_restarts);
            if ceiling.is_none() {
                state.config.running = true;
                state.login_retries = 0;
            }
            (state.input.credential.clone(), ceiling)
        };

        if let Some(max) = ceiling {
            self.log("Restart ceiling reached; task cannot be started again", Severity::Error)
                .await;
            return (Err(TaskError::RestartCeiling(max)), TaskPhase::Stopped);
        }

        if let Err(e) = self.deps.credentials.save(self.id, &credential).await {
            self.log(format!("Failed to save credential: {e}"), Severity::Error)
                .await;
            self.state.write().await.config.running = false;
            return (
                Err(TaskError::CredentialUnwritable(e.to_string())),
                TaskPhase::Stopped,
            );
        }
        self.log("Credential saved", Severity::Success).await;

        let count = self.state.read().await.message_data.messages.len();
        if count == 0 {
            self.log("No messages found to send", Severity::Error).await;
            self.state.write().await.config.running = false;
            return (Err(TaskError::EmptyMessageSet), TaskPhase::Stopped);
        }

        self.log(format!("Starting task with {count} messages"), Severity::Info)
            .await;
        (Ok(()), TaskPhase::LoggingIn)
    }

    async fn stop(&mut self) {
        {
            let mut state = self.state.write().await;
            state.config.running = false;
            state.stats.active_sessions = 0;
        }
        self.session = None;
        self.log("Task stopped by operator - session stays logged in", Severity::Info)
            .await;
        self.log(
            "The same credential can be reused without a fresh login",
            Severity::Info,
        )
        .await;

        if let Err(e) = self.deps.credentials.remove(self.id).await {
            debug!(task_id = %self.id, error = %e, "Credential cleanup failed");
        }
    }

    // ------------------------------------------------------------------
    // LoggingIn
    // ------------------------------------------------------------------

    async fn login(&mut self) -> Next {
        if !self.running().await {
            return Some(TaskPhase::Stopped);
        }

        let credential = self.state.read().await.input.credential.clone();
        let client = Arc::clone(&self.deps.client);
        let attempt =
            async move { client.login(&credential, &LoginOptions::default()).await };
        let result = match self.guard(attempt).await {
            Ok(result) => result,
            Err(interrupt) => return redirect(interrupt),
        };

        match result {
            Ok(session) => {
                self.session = Some(Arc::clone(&session));
                {
                    let mut state = self.state.write().await;
                    state.stats.active_sessions = 1;
                    state.login_retries = 0;
                }
                self.log("Logged in successfully", Severity::Success).await;
                if let Err(interrupt) = self.describe_target(session).await {
                    return redirect(interrupt);
                }
                Some(TaskPhase::Sending)
            }
            Err(err) => {
                let reason = redact_sensitive_data(&err.to_string());
                self.log(format!("Login failed: {reason}"), Severity::Error)
                    .await;

                let max = self.deps.limits.max_login_retries;
                let retries = {
                    let mut state = self.state.write().await;
                    state.login_retries += 1;
                    state.login_retries
                };

                if retries < max {
                    let backoff = self.deps.limits.login_backoff;
                    self.log(
                        format!(
                            "Auto-retry login attempt {retries}/{max} in {} seconds...",
                            backoff.as_secs()
                        ),
                        Severity::Info,
                    )
                    .await;
                    match self.pause(backoff).await {
                        Ok(()) => Some(TaskPhase::LoggingIn),
                        Err(interrupt) => redirect(interrupt),
                    }
                } else {
                    self.log("Max login retries reached. Task paused.", Severity::Error)
                        .await;
                    self.state.write().await.config.running = false;
                    Some(TaskPhase::Stopped)
                }
            }
        }
    }

    /// Best-effort recipient lookup, for the log only.
    async fn describe_target(&mut self, session: Arc<dyn Session>) -> Result<(), Interrupt> {
        let recipient_id = self.state.read().await.message_data.recipient_id.clone();
        let recipient = Recipient::Text(recipient_id.clone());
        let lookup = async move { session.thread_info(&recipient).await };
        if let Ok(info) = self.guard(lookup).await? {
            let name = info.name.unwrap_or_else(|| "Unknown".to_string());
            self.log(format!("Target: {name} (ID: {recipient_id})"), Severity::Info)
                .await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    async fn send_next(&mut self) -> Next {
        if !self.running().await {
            return Some(TaskPhase::Stopped);
        }
        let Some(session) = self.session.clone() else {
            return Some(TaskPhase::LoggingIn);
        };

        let (message, index, total, wrapped) = {
            let mut state = self.state.write().await;
            let wrapped = state.wrap_cursor();
            let data = &state.message_data;
            let index = data.current_index;
            (
                data.messages.get(index).map(str::to_string),
                index,
                data.messages.len(),
                wrapped,
            )
        };
        if let Some(loop_count) = wrapped {
            self.log(
                format!("Loop #{loop_count} completed. Restarting."),
                Severity::Info,
            )
            .await;
        }
        let Some(message) = message else {
            self.log("No messages found to send", Severity::Error).await;
            self.state.write().await.config.running = false;
            return Some(TaskPhase::Stopped);
        };

        match self.deliver(session, &message, index, total).await {
            Delivery::Delivered | Delivery::GaveUp => {
                self.state.write().await.advance_cursor();
                self.schedule_next().await
            }
            Delivery::Fault(err) => {
                let reason = redact_sensitive_data(&err.to_string());
                self.log(
                    format!("CRITICAL: send error - restarting session ({reason})"),
                    Severity::Error,
                )
                .await;
                Some(self.restart("session fault while sending").await)
            }
            Delivery::Cancelled => Some(TaskPhase::Stopped),
            Delivery::Interrupted(interrupt) => redirect(interrupt),
        }
    }

    async fn schedule_next(&mut self) -> Next {
        if !self.running().await {
            return Some(TaskPhase::Stopped);
        }
        let delay = Duration::from_secs(self.state.read().await.config.delay_secs);
        match self.pause(delay).await {
            Ok(()) => Some(TaskPhase::Sending),
            Err(interrupt) => redirect(interrupt),
        }
    }

    /// Deliver one message, retrying per the active strategy. The standard
    /// strategy hands over to a matching fallback on its first failure.
    async fn deliver(
        &mut self,
        session: Arc<dyn Session>,
        message: &str,
        index: usize,
        total: usize,
    ) -> Delivery {
        let recipient = self.state.read().await.message_data.recipient_id.clone();
        let mut strategy = Arc::clone(self.deps.delivery.standard());
        let mut diverted = false;
        let mut attempt = 0u32;

        loop {
            if !self.running().await {
                return Delivery::Cancelled;
            }

            let round = {
                let strategy = Arc::clone(&strategy);
                let session = Arc::clone(&session);
                let body = message.to_string();
                let recipient = recipient.clone();
                async move { strategy.attempt(session.as_ref(), &body, &recipient).await }
            };
            let err = match self.guard(round).await {
                Ok(Ok(())) => {
                    self.record_success(strategy.name(), index, total).await;
                    return Delivery::Delivered;
                }
                Ok(Err(err)) => err,
                Err(interrupt) => return Delivery::Interrupted(interrupt),
            };

            if err.is_fault() && strategy.escalates_faults() {
                return Delivery::Fault(err);
            }
            // fallback rounds are not counted
            if !diverted {
                self.state.write().await.stats.failed += 1;
            }

            if !diverted {
                if let Some(fallback) = self.deps.delivery.fallback_for(&recipient) {
                    self.log(
                        format!(
                            "{} recipient ID detected. Trying alternative...",
                            fallback.name()
                        ),
                        Severity::Warning,
                    )
                    .await;
                    strategy = fallback;
                    diverted = true;
                    continue;
                }
            }

            let policy = strategy.policy();
            if policy.should_retry(attempt) {
                attempt += 1;
                self.log(
                    format!(
                        "RETRY {attempt}/{} | Message {}/{total} | {}",
                        policy.max_retries,
                        index + 1,
                        strategy.name()
                    ),
                    Severity::Info,
                )
                .await;
                if let Err(interrupt) = self.pause(policy.delay).await {
                    return Delivery::Interrupted(interrupt);
                }
            } else {
                let reason = redact_sensitive_data(&err.to_string());
                self.log(
                    format!(
                        "FAILED after {} retries | Message {}/{total} | {} ({reason})",
                        policy.max_retries,
                        index + 1,
                        strategy.name()
                    ),
                    Severity::Error,
                )
                .await;
                return Delivery::GaveUp;
            }
        }
    }

    async fn record_success(&self, strategy: &str, index: usize, total: usize) {
        let loop_number = {
            let mut state = self.state.write().await;
            state.stats.sent += 1;
            state.stats.last_success = Some(Utc::now());
            state.login_retries = 0;
            state.message_data.loop_count + 1
        };
        self.log(
            format!(
                "SENT | Message {}/{total} | Loop {loop_number} | {strategy}",
                index + 1
            ),
            Severity::Success,
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Restarting
    // ------------------------------------------------------------------

    /// Drop the session and count a restart. Returns `Stopped` once the
    /// restart ceiling is reached; the count never goes past it.
    async fn restart(&mut self, reason: &str) -> TaskPhase {
        self.log(format!("RESTARTING TASK: {reason}"), Severity::Info)
            .await;
        self.session = None;

        let ceiling_hit = {
            let mut state = self.state.write().await;
            state.stats.active_sessions = 0;
            if state.config.restart_count >= state.config.max_restarts {
                state.config.running = false;
                state.config.ceiling_reached = true;
                true
            } else {
                state.config.restart_count += 1;
                state.stats.restarts += 1;
                false
            }
        };

        if ceiling_hit {
            self.log("MAX RESTARTS REACHED - Task stopped", Severity::Error)
                .await;
            TaskPhase::Stopped
        } else {
            TaskPhase::Restarting
        }
    }

    async fn await_restart(&mut self) -> Next {
        let backoff = self.deps.limits.restart_backoff;
        if let Err(interrupt) = self.pause(backoff).await {
            return redirect(interrupt);
        }
        if self.running().await {
            Some(TaskPhase::LoggingIn)
        } else {
            Some(TaskPhase::Stopped)
        }
    }
}
