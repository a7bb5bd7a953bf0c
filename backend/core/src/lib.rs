pub mod error;
pub mod event;
pub mod limits;
pub mod log;
pub mod message_set;
pub mod session;
pub mod types;

pub use error::{ClientError, CourierError, TaskError};
pub use event::TaskEvent;
pub use limits::{TaskLimits, DEFAULT_DELAY_SECS};
pub use log::{LogEntry, LogRing, Severity, DEFAULT_LOG_CAPACITY};
pub use message_set::MessageSet;
pub use session::{
    CredentialStore, LoginOptions, MessageBody, Recipient, Session, SessionClient, ThreadInfo,
};
pub use types::{
    MessageData, TaskConfig, TaskDetails, TaskId, TaskInput, TaskPhase, TaskSnapshot, TaskState,
    TaskStats,
};
