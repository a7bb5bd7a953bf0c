//! Log Redaction Layer
//!
//! Scrubs session cookies, serialized cookie values and bearer tokens from
//! strings before they reach a log line.

use regex::Regex;
use std::sync::LazyLock;

static COOKIE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(c_user|xs|datr|fr|sb|[a-z_]*token|[a-z_]*session[a-z_]*)=([^;\s]+)").unwrap()
});
static COOKIE_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""value"\s*:\s*"[^"]*""#).unwrap());
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = COOKIE_RE.replace_all(input, "$1=[REDACTED]");
    let redacted = COOKIE_VALUE_RE.replace_all(&redacted, r#""value":"[REDACTED]""#);
    BEARER_RE
        .replace_all(&redacted, "Bearer [REDACTED_TOKEN]")
        .into_owned()
}
