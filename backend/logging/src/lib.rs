//! Structured logging for Courier.
//!
//! Console plus daily NDJSON file output, credential redaction, and the
//! task audit trail.

pub mod audit;
pub mod logger;
pub mod redact;

pub use audit::{AuditEntry, AuditLog, TaskAuditEvent};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
