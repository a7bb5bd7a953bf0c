//! Task Audit Log
//!
//! Operator-level lifecycle events (submit, stop, restore, watchdog
//! restarts) emitted as structured records on the `task_audit` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskAuditEvent {
    Submitted {
        recipient_id: String,
        messages: usize,
    },
    Stopped,
    Restored {
        resumed: bool,
    },
    WatchdogRestart {
        idle_secs: i64,
    },
    Rejected {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub task_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: TaskAuditEvent,
}

pub struct AuditLog;

impl AuditLog {
    /// Build the audit entry and hand it to the tracing system.
    pub fn record(task_id: Uuid, mut event: TaskAuditEvent) -> AuditEntry {
        if let TaskAuditEvent::Rejected { reason } = &mut event {
            *reason = redact_sensitive_data(reason);
        }

        let entry = AuditEntry {
            task_id,
            timestamp: Utc::now(),
            event,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "task_audit", task_id = %task_id, entry = %json, "Task audit event"),
            Err(e) => info!(target: "task_audit", task_id = %task_id, error = %e, "Unserializable audit event"),
        }
        entry
    }
}
