use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::limits::{TaskLimits, DEFAULT_DELAY_SECS};
use crate::log::{LogEntry, LogRing, Severity};
use crate::message_set::MessageSet;

pub type TaskId = Uuid;

/// Parameters supplied by the operator when a task is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub message_content: String,
    pub prefix_label: String,
    pub suffix_label: String,
    pub recipient_id: String,
    #[serde(default)]
    pub delay: Option<i64>,
    /// Raw session credential blob, handed to the provider at login.
    pub credential: String,
}

impl TaskInput {
    /// Inter-message delay in seconds; absent or non-positive values fall back to the default.
    pub fn effective_delay(&self) -> u64 {
        match self.delay {
            Some(secs) if secs > 0 => secs as u64,
            _ => DEFAULT_DELAY_SECS,
        }
    }
}

/// Lifecycle phase of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Idle,
    LoggingIn,
    Sending,
    Restarting,
    Stopped,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPhase::Idle => "idle",
            TaskPhase::LoggingIn => "logging_in",
            TaskPhase::Sending => "sending",
            TaskPhase::Restarting => "restarting",
            TaskPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    pub delay_secs: u64,
    pub running: bool,
    pub last_activity: DateTime<Utc>,
    pub restart_count: u32,
    pub max_restarts: u32,
    /// Set once a restart was refused at the ceiling; the task never runs again.
    #[serde(default)]
    pub ceiling_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub recipient_id: String,
    pub messages: MessageSet,
    pub current_index: usize,
    pub loop_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub sent: u64,
    pub failed: u64,
    /// 1 while a provider session is held, otherwise 0.
    pub active_sessions: u8,
    pub loops: u64,
    pub restarts: u64,
    pub last_success: Option<DateTime<Utc>>,
}

/// Persisted form of a task; everything except the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub input: TaskInput,
    pub config: TaskConfig,
    pub message_data: MessageData,
    pub stats: TaskStats,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Status view returned to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub task_id: TaskId,
    pub sent: u64,
    pub failed: u64,
    pub active_sessions: u8,
    pub loops: u64,
    pub restarts: u64,
    pub restart_count: u32,
    pub logs: Vec<LogEntry>,
    pub running: bool,
    pub phase: TaskPhase,
    /// Milliseconds since the last recorded activity.
    pub idle_ms: i64,
}

/// Mutable state of one task, owned by that task's actor.
///
/// Everything outside the actor only takes short read locks for status and
/// persistence snapshots.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub id: TaskId,
    pub input: TaskInput,
    pub config: TaskConfig,
    pub message_data: MessageData,
    pub stats: TaskStats,
    pub logs: LogRing,
    pub phase: TaskPhase,
    pub login_retries: u32,
}

impl TaskState {
    pub fn new(id: TaskId, input: TaskInput, limits: &TaskLimits) -> Self {
        let messages =
            MessageSet::build(&input.message_content, &input.prefix_label, &input.suffix_label);
        let mut state = Self {
            id,
            config: TaskConfig {
                delay_secs: input.effective_delay(),
                running: false,
                last_activity: Utc::now(),
                restart_count: 0,
                max_restarts: limits.max_restarts,
                ceiling_reached: false,
            },
            message_data: MessageData {
                recipient_id: input.recipient_id.clone(),
                messages,
                current_index: 0,
                loop_count: 0,
            },
            input,
            stats: TaskStats::default(),
            logs: LogRing::with_capacity(limits.log_capacity),
            phase: TaskPhase::Idle,
            login_retries: 0,
        };
        let loaded = state.message_data.messages.len();
        state.push_log(format!("Loaded {loaded} formatted messages"), Severity::Info);
        state
    }

    /// Rebuild a task from its persisted snapshot. The task comes back not
    /// running; the caller decides when to start it again.
    pub fn restore(id: TaskId, snapshot: TaskSnapshot, limits: &TaskLimits) -> Self {
        let TaskSnapshot {
            input,
            mut config,
            message_data,
            mut stats,
            logs,
        } = snapshot;
        config.running = false;
        stats.active_sessions = 0;
        Self {
            id,
            input,
            config,
            message_data,
            stats,
            logs: LogRing::from_entries(logs, limits.log_capacity),
            phase: TaskPhase::Idle,
            login_retries: 0,
        }
    }

    /// Append a log entry and refresh the activity timestamp.
    pub fn push_log(&mut self, message: impl Into<String>, severity: Severity) -> LogEntry {
        let now = Utc::now();
        let entry = LogEntry {
            time: now,
            message: message.into(),
            severity,
        };
        self.logs.push(entry.clone());
        self.config.last_activity = now;
        entry
    }

    /// Wrap the cursor back to the start once a full pass has completed.
    /// Returns the new loop count when a wrap happened.
    pub fn wrap_cursor(&mut self) -> Option<u64> {
        let data = &mut self.message_data;
        if data.current_index < data.messages.len() {
            return None;
        }
        data.loop_count += 1;
        data.current_index = 0;
        self.stats.loops = data.loop_count;
        Some(data.loop_count)
    }

    pub fn advance_cursor(&mut self) {
        self.message_data.current_index += 1;
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let idle = now - self.config.last_activity;
        idle.to_std().map(|idle| idle > threshold).unwrap_or(false)
    }

    pub fn details(&self, now: DateTime<Utc>) -> TaskDetails {
        TaskDetails {
            task_id: self.id,
            sent: self.stats.sent,
            failed: self.stats.failed,
            active_sessions: self.stats.active_sessions,
            loops: self.stats.loops,
            restarts: self.stats.restarts,
            restart_count: self.config.restart_count,
            logs: self.logs.iter().cloned().collect(),
            running: self.config.running,
            phase: self.phase,
            idle_ms: (now - self.config.last_activity).num_milliseconds(),
        }
    }

    pub fn snapshot(&self, log_limit: usize) -> TaskSnapshot {
        TaskSnapshot {
            input: self.input.clone(),
            config: self.config.clone(),
            message_data: self.message_data.clone(),
            stats: self.stats.clone(),
            logs: self.logs.recent(log_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(content: &str, delay: Option<i64>) -> TaskInput {
        TaskInput {
            message_content: content.to_string(),
            prefix_label: "A".into(),
            suffix_label: "B".into(),
            recipient_id: "42".into(),
            delay,
            credential: "c_user=1; xs=secret".into(),
        }
    }

    #[test]
    fn delay_defaults_when_missing_or_non_positive() {
        assert_eq!(input("x", None).effective_delay(), 5);
        assert_eq!(input("x", Some(0)).effective_delay(), 5);
        assert_eq!(input("x", Some(-3)).effective_delay(), 5);
        assert_eq!(input("x", Some(12)).effective_delay(), 12);
    }

    #[test]
    fn new_state_builds_messages_and_logs_count() {
        let state = TaskState::new(Uuid::new_v4(), input("hello\n\nworld\r\n", None), &TaskLimits::default());
        assert_eq!(state.message_data.messages.len(), 2);
        assert_eq!(state.logs.latest().unwrap().message, "Loaded 2 formatted messages");
        assert!(!state.config.running);
        assert_eq!(state.config.max_restarts, 1000);
        assert_eq!(state.phase, TaskPhase::Idle);
    }

    #[test]
    fn cursor_wraps_once_per_pass() {
        let mut state = TaskState::new(Uuid::new_v4(), input("a\nb", None), &TaskLimits::default());
        assert_eq!(state.wrap_cursor(), None);
        state.advance_cursor();
        assert_eq!(state.wrap_cursor(), None);
        state.advance_cursor();
        assert_eq!(state.wrap_cursor(), Some(1));
        assert_eq!(state.message_data.current_index, 0);
        assert_eq!(state.stats.loops, 1);
        assert_eq!(state.wrap_cursor(), None);
    }

    #[test]
    fn staleness_uses_last_activity() {
        let mut state = TaskState::new(Uuid::new_v4(), input("a", None), &TaskLimits::default());
        let now = Utc::now();
        state.config.last_activity = now - chrono::Duration::seconds(301);
        assert!(state.is_stale(now, Duration::from_secs(300)));
        state.config.last_activity = now - chrono::Duration::seconds(10);
        assert!(!state.is_stale(now, Duration::from_secs(300)));
    }

    #[test]
    fn snapshot_restore_comes_back_stopped() {
        let limits = TaskLimits::default();
        let mut state = TaskState::new(Uuid::new_v4(), input("a\nb\nc", Some(7)), &limits);
        state.config.running = true;
        state.stats.active_sessions = 1;
        state.stats.sent = 9;
        state.message_data.current_index = 2;
        for n in 0..80 {
            state.push_log(format!("line {n}"), Severity::Info);
        }

        let snapshot = state.snapshot(limits.persisted_logs);
        assert_eq!(snapshot.logs.len(), 50);
        assert_eq!(snapshot.logs[0].message, "line 79");

        let restored = TaskState::restore(state.id, snapshot, &limits);
        assert!(!restored.config.running);
        assert_eq!(restored.stats.active_sessions, 0);
        assert_eq!(restored.stats.sent, 9);
        assert_eq!(restored.message_data.current_index, 2);
        assert_eq!(restored.config.delay_secs, 7);
    }

    #[test]
    fn details_expose_status_fields() {
        let mut state = TaskState::new(Uuid::new_v4(), input("a", None), &TaskLimits::default());
        state.stats.failed = 3;
        let details = state.details(Utc::now());
        assert_eq!(details.failed, 3);
        assert_eq!(details.logs.len(), 1);
        assert!(details.idle_ms >= 0);
        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("activeSessions").is_some());
        assert!(json.get("credential").is_none());
    }
}
