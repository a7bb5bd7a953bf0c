//! Ordered, immutable list of outgoing message bodies.

use std::ops::Index;

use serde::{Deserialize, Serialize};

/// The formatted messages a task cycles through.
///
/// Built once from raw text and two decoration labels; only the task's
/// cursor moves afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSet(Vec<String>);

impl MessageSet {
    /// Split `raw` into lines, drop carriage returns and blank lines, and wrap
    /// each remaining line as `prefix + " " + line + " " + suffix`.
    pub fn build(raw: &str, prefix: &str, suffix: &str) -> Self {
        let messages = raw
            .split('\n')
            .map(|line| line.replace('\r', ""))
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .map(|line| format!("{prefix} {line} {suffix}"))
            .collect();
        Self(messages)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Index<usize> for MessageSet {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_non_empty_lines() {
        let set = MessageSet::build("hello\n\nworld\r\n", "A", "B");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["A hello B", "A world B"]);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let set = MessageSet::build("   spaced out  \n\t tabbed\t", "[", "]");
        assert_eq!(set.len(), 2);
        assert_eq!(&set[0], "[ spaced out ]");
        assert_eq!(&set[1], "[ tabbed ]");
    }

    #[test]
    fn empty_input_is_valid_and_empty() {
        assert!(MessageSet::build("", "A", "B").is_empty());
        assert!(MessageSet::build("\r\n  \n\r", "A", "B").is_empty());
    }

    #[test]
    fn length_matches_non_blank_lines() {
        let raw = "one\r\ntwo\n   \nthree\n\n\nfour";
        let set = MessageSet::build(raw, "p", "s");
        let expected = raw.lines().filter(|l| !l.trim().is_empty()).count();
        assert_eq!(set.len(), expected);
    }

    #[test]
    fn empty_labels_keep_separating_spaces() {
        let set = MessageSet::build("x", "", "");
        assert_eq!(set.get(0), Some(" x "));
    }

    #[test]
    fn serializes_as_plain_array() {
        let set = MessageSet::build("a\nb", "1", "2");
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["1 a 2","1 b 2"]"#);
        let back: MessageSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
