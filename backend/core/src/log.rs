use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of entries kept per task.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Severity of a task log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

/// Bounded log buffer, newest entry first.
///
/// Pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild a ring from persisted entries (newest first), truncating to capacity.
    pub fn from_entries(entries: Vec<LogEntry>, capacity: usize) -> Self {
        let mut entries: VecDeque<LogEntry> = entries.into();
        entries.truncate(capacity);
        Self { entries, capacity }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        self.entries.iter().take(n).cloned().collect()
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> LogEntry {
        LogEntry {
            time: Utc::now(),
            message: format!("entry {n}"),
            severity: Severity::Info,
        }
    }

    #[test]
    fn newest_first_and_bounded() {
        let mut ring = LogRing::default();
        for n in 0..250 {
            ring.push(entry(n));
            assert!(ring.len() <= DEFAULT_LOG_CAPACITY);
            assert_eq!(ring.latest().unwrap().message, format!("entry {n}"));
        }
        assert_eq!(ring.len(), DEFAULT_LOG_CAPACITY);
        // oldest surviving entry is 150
        assert_eq!(ring.iter().last().unwrap().message, "entry 150");
    }

    #[test]
    fn recent_takes_prefix() {
        let mut ring = LogRing::with_capacity(10);
        for n in 0..5 {
            ring.push(entry(n));
        }
        let recent = ring.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "entry 4");
        assert_eq!(recent[1].message, "entry 3");
    }

    #[test]
    fn restore_truncates_to_capacity() {
        let entries = (0..8).map(entry).collect();
        let ring = LogRing::from_entries(entries, 3);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.latest().unwrap().message, "entry 0");
    }

    #[test]
    fn severity_display_matches_serde() {
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(
            serde_json::to_string(&Severity::Success).unwrap(),
            "\"success\""
        );
    }
}
