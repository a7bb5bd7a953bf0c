use std::time::Duration;

use crate::log::DEFAULT_LOG_CAPACITY;

/// Inter-message delay applied when a task is submitted without a positive one.
pub const DEFAULT_DELAY_SECS: u64 = 5;

/// Retry ceilings, backoffs and sweep intervals shared by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLimits {
    pub max_login_retries: u32,
    pub login_backoff: Duration,

    pub max_send_retries: u32,
    pub send_retry_delay: Duration,

    pub max_alternate_retries: u32,
    pub alternate_retry_delay: Duration,

    pub max_restarts: u32,
    pub restart_backoff: Duration,

    pub watchdog_interval: Duration,
    pub stale_after: Duration,

    pub persist_interval: Duration,
    pub resume_grace: Duration,

    pub log_capacity: usize,
    pub persisted_logs: usize,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self {
            max_login_retries: 50,
            login_backoff: Duration::from_secs(30),
            max_send_retries: 10,
            send_retry_delay: Duration::from_secs(5),
            max_alternate_retries: 5,
            alternate_retry_delay: Duration::from_secs(3),
            max_restarts: 1000,
            restart_backoff: Duration::from_secs(10),
            watchdog_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            persist_interval: Duration::from_secs(30),
            resume_grace: Duration::from_secs(5),
            log_capacity: DEFAULT_LOG_CAPACITY,
            persisted_logs: 50,
        }
    }
}
