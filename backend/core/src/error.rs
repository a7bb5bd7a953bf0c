use thiserror::Error;

use crate::types::TaskId;

/// Top-level error type for the Courier runtime.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasons a task refuses to start or stops accepting commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("message set is empty")]
    EmptyMessageSet,

    #[error("failed to store session credential: {0}")]
    CredentialUnwritable(String),

    #[error("restart ceiling of {0} reached")]
    RestartCeiling(u32),

    #[error("task actor is no longer running")]
    ActorGone,
}

/// Errors reported by a [`SessionClient`](crate::session::SessionClient) or
/// [`Session`](crate::session::Session).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The provider rejected the credential.
    #[error("login rejected: {0}")]
    Auth(String),

    /// The provider reported a delivery failure for one message.
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The session itself misbehaved while dispatching.
    #[error("session fault: {0}")]
    Fault(String),
}

impl ClientError {
    pub fn is_fault(&self) -> bool {
        matches!(self, ClientError::Fault(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fault_is_session_level() {
        assert!(ClientError::Fault("boom".into()).is_fault());
        assert!(!ClientError::Rejected("nope".into()).is_fault());
        assert!(!ClientError::Auth("expired".into()).is_fault());
    }

    #[test]
    fn task_error_converts_into_courier_error() {
        let err: CourierError = TaskError::EmptyMessageSet.into();
        assert_eq!(err.to_string(), "message set is empty");
    }
}
