//! WebSocket protocol for the Courier gateway.

use serde::{Deserialize, Serialize};

use courier_core::{Severity, TaskDetails, TaskEvent, TaskId, TaskInput};

/// Client -> Server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit a task; the connection follows its log feed.
    Start(TaskInput),
    /// Follow the log feed of an existing task.
    Subscribe {
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },
    Stop {
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },
    /// One task, or every task when `taskId` is absent.
    Status {
        #[serde(rename = "taskId", default)]
        task_id: Option<TaskId>,
    },
    Ping,
}

/// Server -> Client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    TaskStarted {
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },
    TaskFailed {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        error: String,
    },
    Log {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        message: String,
        severity: Severity,
    },
    Status {
        tasks: Vec<TaskDetails>,
    },
    Stopped {
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },
    Error {
        message: String,
    },
    Pong,
}

impl From<TaskEvent> for ServerMessage {
    fn from(event: TaskEvent) -> Self {
        ServerMessage::Log {
            task_id: event.task_id,
            message: event.message,
            severity: event.severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn start_carries_task_input_inline() {
        let raw = json!({
            "type": "start",
            "messageContent": "hello\nworld",
            "prefixLabel": "A",
            "suffixLabel": "B",
            "recipientId": "123456789012345",
            "delay": 7,
            "credential": "c_user=1"
        });
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        let ClientMessage::Start(input) = msg else {
            panic!("expected start");
        };
        assert_eq!(input.recipient_id, "123456789012345");
        assert_eq!(input.delay, Some(7));
    }

    #[test]
    fn status_task_id_is_optional() {
        let msg: ClientMessage = serde_json::from_value(json!({"type": "status"})).unwrap();
        assert_eq!(msg, ClientMessage::Status { task_id: None });
    }

    #[test]
    fn log_lines_use_camel_case_id() {
        let id = Uuid::new_v4();
        let msg = ServerMessage::from(TaskEvent::new(id, "SENT", Severity::Success));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "log");
        assert_eq!(value["taskId"], id.to_string());
        assert_eq!(value["severity"], "success");
    }
}
