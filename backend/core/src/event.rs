use serde::{Deserialize, Serialize};

use crate::log::Severity;
use crate::types::TaskId;

/// One task log line, fanned out to every log-feed subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub message: String,
    pub severity: Severity,
}

impl TaskEvent {
    pub fn new(task_id: TaskId, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            task_id,
            message: message.into(),
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn serializes_with_camel_case_keys() {
        let id = Uuid::new_v4();
        let event = TaskEvent::new(id, "Logged in successfully", Severity::Success);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["taskId"], serde_json::json!(id.to_string()));
        assert_eq!(json["severity"], "success");
    }
}
